//! A shared compiler compiles tasks from several threads.

use std::thread;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use rydberg_compile::{CompiledProgram, Compiler, Params};
use rydberg_hal::Capabilities;
use rydberg_ir::{
    AnalogCircuit, BravaisLattice, Field, FieldName, LevelCoupling, Pulse, Scalar, Sequence,
    Waveform,
};

fn circuit() -> AnalogCircuit {
    let amplitude = Waveform::linear(0, Scalar::var("omega"), dec!(0.5))
        .append(&Waveform::constant(Scalar::var("omega"), dec!(0.5)))
        .append(&Waveform::linear(Scalar::var("omega"), 0, dec!(0.5)));
    let detuning = Waveform::linear(Scalar::var("delta"), 0, dec!(1.5));
    let pulse = Pulse::from_field(FieldName::RabiAmplitude, Field::uniform(amplitude))
        .with_field(FieldName::Detuning, Field::uniform(detuning))
        .unwrap();
    AnalogCircuit::new(
        BravaisLattice::square(3, 6),
        Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse),
    )
}

fn params() -> Params {
    let omegas: Vec<Decimal> = (1..=8).map(Decimal::from).collect();
    let deltas: Vec<Decimal> = (1..=8).map(|i| Decimal::from(-i)).collect();
    Params::new()
        .batch_assign([("omega", omegas), ("delta", deltas)])
        .unwrap()
}

fn compile_concurrently(compiler: &Compiler) -> Vec<CompiledProgram> {
    let circuit = circuit();
    let tasks = compiler.tasks(&params(), &[]).unwrap();
    thread::scope(|scope| {
        let handles: Vec<_> = tasks
            .iter()
            .map(|bindings| scope.spawn(|| compiler.compile_task(&circuit, bindings)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect()
    })
}

#[test]
fn test_hardware_tasks_match_sequential_compile() {
    let compiler = Compiler::hardware(Capabilities::aquila());
    let sequential = compiler.compile_batch(&circuit(), &params(), &[]).unwrap();
    let concurrent = compile_concurrently(&compiler);
    assert_eq!(concurrent.len(), 8);
    assert_eq!(concurrent, sequential);
}

#[test]
fn test_emulator_programs_match_sequential_compile() {
    let compiler = Compiler::emulator();
    let sequential = compiler.compile_batch(&circuit(), &params(), &[]).unwrap();
    let concurrent = compile_concurrently(&compiler);
    assert_eq!(concurrent, sequential);

    let program = concurrent[2].as_emulator().unwrap();
    let rabi = &program.drives[&LevelCoupling::GroundRydberg].rabi[0];
    assert_eq!(rabi.amplitude.eval(dec!(1)).unwrap(), dec!(3));
}
