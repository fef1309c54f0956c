//! Compiler façade: one symbolic circuit in, one program per task out.

use rust_decimal::Decimal;
use tracing::{info, instrument};

use rydberg_hal::{BatchTasks, Capabilities, DeviceConfig, HardwareTask, RoundingMode};
use rydberg_ir::{AnalogCircuit, Bindings};

use crate::codegen::{EmulatorCodegen, EmulatorProgram, HardwareCodegen, UnitConversion, WaveformCache};
use crate::error::{CompileError, CompileResult};
use crate::manager::PassManagerBuilder;
use crate::params::Params;

/// Options applied to every task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Shots per hardware task.
    pub nshots: u32,
    /// Program units → device units.
    pub units: UnitConversion,
    /// Rounding to the device resolution; `None` keeps exact values.
    pub rounding: Option<RoundingMode>,
    /// Blockade radius passed to the emulator.
    pub blockade_radius: Option<Decimal>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            nshots: 100,
            units: UnitConversion::si(),
            rounding: Some(RoundingMode::default()),
            blockade_radius: None,
        }
    }
}

/// What the compiler emits.
#[derive(Debug, Clone)]
enum Target {
    /// A device, with its limits in device units.
    Hardware(Box<Capabilities>),
    Emulator,
}

/// The result of compiling one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledProgram {
    Hardware(HardwareTask),
    Emulator(EmulatorProgram),
}

impl CompiledProgram {
    pub fn as_hardware(&self) -> Option<&HardwareTask> {
        match self {
            CompiledProgram::Hardware(task) => Some(task),
            CompiledProgram::Emulator(_) => None,
        }
    }

    pub fn as_emulator(&self) -> Option<&EmulatorProgram> {
        match self {
            CompiledProgram::Emulator(program) => Some(program),
            CompiledProgram::Hardware(_) => None,
        }
    }

    pub fn into_hardware(self) -> Option<HardwareTask> {
        match self {
            CompiledProgram::Hardware(task) => Some(task),
            CompiledProgram::Emulator(_) => None,
        }
    }
}

/// Compiles symbolic circuits for one target.
///
/// The compiler holds no mutable state: [`Compiler::compile_task`] takes
/// `&self` and may be called from several threads at once, one task each.
///
/// # Example
///
/// ```
/// use rydberg_compile::{CompileOptions, Compiler, Params, UnitConversion};
/// use rydberg_hal::Capabilities;
/// use rydberg_ir::{
///     AnalogCircuit, BravaisLattice, Field, FieldName, LevelCoupling, Pulse, Scalar, Sequence,
///     Waveform,
/// };
/// use rust_decimal::Decimal;
///
/// let amplitude = Waveform::linear(0, Scalar::var("omega"), 1).append(&Waveform::linear(
///     Scalar::var("omega"),
///     0,
///     1,
/// ));
/// let pulse = Pulse::from_field(FieldName::RabiAmplitude, Field::uniform(amplitude));
/// let circuit = AnalogCircuit::new(
///     BravaisLattice::chain(3, 6),
///     Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse),
/// );
///
/// let params = Params::new()
///     .batch_assign([("omega", vec![Decimal::from(5), Decimal::from(10)])])
///     .unwrap();
/// let compiler = Compiler::hardware(Capabilities::aquila());
/// let tasks = compiler.compile_hardware_batch(&circuit, &params, &[]).unwrap();
/// assert_eq!(tasks.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Compiler {
    target: Target,
    options: CompileOptions,
}

impl Compiler {
    /// Compile hardware tasks for a device with limits `capabilities`
    /// (device units).
    pub fn hardware(capabilities: Capabilities) -> Self {
        Self {
            target: Target::Hardware(Box::new(capabilities)),
            options: CompileOptions::default(),
        }
    }

    /// Compile emulator programs; no device limits apply.
    pub fn emulator() -> Self {
        Self {
            target: Target::Emulator,
            options: CompileOptions::default(),
        }
    }

    /// A hardware compiler using the device and defaults of `config`.
    pub fn from_config(config: &DeviceConfig) -> Self {
        let options = CompileOptions {
            nshots: config.compile.nshots,
            rounding: Some(config.compile.rounding),
            ..CompileOptions::default()
        };
        Self::hardware(config.device.clone()).with_options(options)
    }

    #[must_use]
    pub fn with_options(mut self, options: CompileOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// The device limits, for hardware targets.
    pub fn capabilities(&self) -> Option<&Capabilities> {
        match &self.target {
            Target::Hardware(caps) => Some(&**caps),
            Target::Emulator => None,
        }
    }

    /// Bindings of every task described by `params` and `args`.
    pub fn tasks(&self, params: &Params, args: &[Decimal]) -> CompileResult<Vec<Bindings>> {
        params.tasks(args)
    }

    /// Bind, normalize, validate and generate code for one task.
    ///
    /// Either a complete program is returned or an error; nothing partial.
    pub fn compile_task(&self, circuit: &AnalogCircuit, bindings: &Bindings) -> CompileResult<CompiledProgram> {
        let mut builder = PassManagerBuilder::new().with_bindings(bindings.clone());
        if let Target::Hardware(caps) = &self.target {
            self.check_shots(caps)?;
            builder = builder.with_capabilities(self.options.units.program_capabilities(caps)?);
        }
        let (pm, mut properties) = builder.build();

        let mut circuit = circuit.clone();
        pm.run(&mut circuit, &mut properties)?;

        match &self.target {
            Target::Hardware(caps) => {
                let program_caps = properties
                    .capabilities
                    .as_ref()
                    .ok_or(CompileError::MissingCapabilities)?;
                let task = HardwareCodegen::new(caps, program_caps, &self.options).generate(&circuit)?;
                Ok(CompiledProgram::Hardware(task))
            }
            Target::Emulator => {
                let mut cache = WaveformCache::new();
                let program = EmulatorCodegen::new(self.options.blockade_radius)
                    .generate(&circuit, &mut cache)?;
                Ok(CompiledProgram::Emulator(program))
            }
        }
    }

    /// Compile every task of `params`, in batch order.
    #[instrument(skip(self, circuit, params, args))]
    pub fn compile_batch(
        &self,
        circuit: &AnalogCircuit,
        params: &Params,
        args: &[Decimal],
    ) -> CompileResult<Vec<CompiledProgram>> {
        let tasks = self.tasks(params, args)?;
        info!("Compiling {} tasks", tasks.len());
        let programs = tasks
            .iter()
            .map(|bindings| self.compile_task(circuit, bindings))
            .collect::<CompileResult<Vec<_>>>()?;
        info!("Compiled {} programs", programs.len());
        Ok(programs)
    }

    /// Compile every task of `params` for a hardware target.
    pub fn compile_hardware_batch(
        &self,
        circuit: &AnalogCircuit,
        params: &Params,
        args: &[Decimal],
    ) -> CompileResult<BatchTasks> {
        if matches!(self.target, Target::Emulator) {
            return Err(CompileError::InvalidConfiguration(
                "emulator compiler cannot emit hardware tasks".into(),
            ));
        }
        let tasks = self
            .compile_batch(circuit, params, args)?
            .into_iter()
            .filter_map(CompiledProgram::into_hardware)
            .collect();
        Ok(BatchTasks::new(tasks))
    }

    fn check_shots(&self, caps: &Capabilities) -> CompileResult<()> {
        let limits = &caps.task;
        if (limits.min_shots..=limits.max_shots).contains(&self.options.nshots) {
            Ok(())
        } else {
            Err(CompileError::InvalidConfiguration(format!(
                "nshots {} outside device range [{}, {}]",
                self.options.nshots, limits.min_shots, limits.max_shots
            )))
        }
    }
}
