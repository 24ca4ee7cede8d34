//! Native fixture extensions.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use loom_plugins::{
    Arg, Extension, ExtensionError, MethodSpec, MethodTable, MethodTableError, ParamType,
    PluginContext,
};

/// The fixtures [`FixtureLoader`](crate::FixtureLoader) can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixture {
    /// "Echo Plugin": `echo(string)` (safe), `shout(string)`, `sleep(int)`.
    Echo,
    /// "Calculator Plugin": `add(float, float)` and `divide(float, float)`
    /// (safe), `fail()`, `panic()`.
    Adder,
    /// "Report Generator Plugin": `format_heading(string)` calls the Echo
    /// plugin's `shout` by name through the context;
    /// `count_active_plugins()` and `count_total_plugins()` read the
    /// context's plugin listing.
    Caller,
    /// "Broken Plugin": `on_activate` always fails.
    FailingActivate,
    /// Declares `add(int)` twice, so it never loads.
    OverloadClash,
    /// "String Processor Plugin" whose `upper(string)` always fails.
    BrokenProcessor,
}

impl Fixture {
    /// Every fixture.
    pub const ALL: [Self; 6] = [
        Self::Echo,
        Self::Adder,
        Self::Caller,
        Self::FailingActivate,
        Self::OverloadClash,
        Self::BrokenProcessor,
    ];

    /// Artifact tag.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::Adder => "adder",
            Self::Caller => "caller",
            Self::FailingActivate => "failing-activate",
            Self::OverloadClash => "overload-clash",
            Self::BrokenProcessor => "broken-processor",
        }
    }

    /// Self-reported name once loaded.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Echo => "Echo Plugin",
            Self::Adder => "Calculator Plugin",
            Self::Caller => "Report Generator Plugin",
            Self::FailingActivate => "Broken Plugin",
            Self::OverloadClash => "Clashing Plugin",
            Self::BrokenProcessor => "String Processor Plugin",
        }
    }

    /// Instantiate the fixture, reporting hooks to `log`.
    ///
    /// # Errors
    ///
    /// Fails for [`Fixture::OverloadClash`], whose table is ambiguous.
    pub fn instantiate(self, log: &HookLog) -> Result<Box<dyn Extension>, MethodTableError> {
        let methods = match self {
            Self::Echo => echo_methods()?,
            Self::Adder => adder_methods()?,
            Self::Caller => MethodTable::empty(),
            Self::FailingActivate => MethodTable::empty(),
            Self::OverloadClash => clash_methods()?,
            Self::BrokenProcessor => broken_processor_methods()?,
        };

        let mut fixture = FixtureExtension {
            kind: self,
            methods,
            context: Arc::new(OnceLock::new()),
            log: log.clone(),
        };
        if self == Self::Caller {
            fixture.methods = caller_methods(Arc::clone(&fixture.context))?;
        }
        Ok(Box::new(fixture))
    }
}

impl FromStr for Fixture {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.tag() == s)
            .ok_or_else(|| format!("unknown fixture '{s}'"))
    }
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Shared record of lifecycle hook calls, e.g. `activate:Echo Plugin`.
#[derive(Debug, Clone, Default)]
pub struct HookLog(Arc<Mutex<Vec<String>>>);

impl HookLog {
    /// Record an event.
    pub fn push(&self, event: impl Into<String>) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.into());
    }

    /// Events so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// How many times `event` was recorded.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

struct FixtureExtension {
    kind: Fixture,
    methods: MethodTable,
    context: Arc<OnceLock<PluginContext>>,
    log: HookLog,
}

impl Extension for FixtureExtension {
    fn name(&self) -> &str {
        self.kind.display_name()
    }

    fn description(&self) -> &str {
        match self.kind {
            Fixture::Echo => "Echoes its input",
            Fixture::Adder => "Adds numbers",
            Fixture::Caller => "Formats headings using the Echo Plugin",
            Fixture::FailingActivate => "Refuses to start",
            Fixture::OverloadClash => "Never loads",
            Fixture::BrokenProcessor => "Fails every string operation",
        }
    }

    fn execute(&self, input: &str) -> Result<String, ExtensionError> {
        match self.kind {
            Fixture::Echo => Ok(input.to_owned()),
            _ => Ok(format!("{}: {input}", self.kind.display_name())),
        }
    }

    fn methods(&self) -> &MethodTable {
        &self.methods
    }

    fn set_context(&self, context: PluginContext) {
        self.log.push(format!("context:{}", self.name()));
        let _ = self.context.set(context);
    }

    fn on_activate(&self) -> Result<(), ExtensionError> {
        self.log.push(format!("activate:{}", self.name()));
        if self.kind == Fixture::FailingActivate {
            return Err("refusing to activate".into());
        }
        Ok(())
    }

    fn on_deactivate(&self) {
        self.log.push(format!("deactivate:{}", self.name()));
    }
}

fn text(args: &[Arg], i: usize) -> String {
    args.get(i)
        .and_then(Arg::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn float(args: &[Arg], i: usize) -> f64 {
    args.get(i).and_then(Arg::as_f64).unwrap_or_default()
}

fn echo_methods() -> Result<MethodTable, MethodTableError> {
    MethodTable::builder()
        .method(
            MethodSpec::new("echo")
                .param(ParamType::String)
                .returns(ParamType::String)
                .safe("Returns its input unchanged"),
            |args| Ok(Arg::Str(text(args, 0))),
        )
        .method(
            MethodSpec::new("shout")
                .param(ParamType::String)
                .returns(ParamType::String),
            |args| Ok(Arg::Str(text(args, 0).to_uppercase())),
        )
        .method(
            MethodSpec::new("sleep")
                .param(ParamType::Int)
                .returns(ParamType::Int),
            |args| {
                let millis = args.first().and_then(Arg::as_i64).unwrap_or_default();
                std::thread::sleep(Duration::from_millis(millis.unsigned_abs()));
                Ok(Arg::Int(millis))
            },
        )
        .build()
}

#[allow(clippy::arithmetic_side_effects)]
fn adder_methods() -> Result<MethodTable, MethodTableError> {
    MethodTable::builder()
        .method(
            MethodSpec::new("add")
                .param(ParamType::Float)
                .param(ParamType::Float)
                .returns(ParamType::Float)
                .safe("Adds two numbers"),
            |args| Ok(Arg::Float(float(args, 0) + float(args, 1))),
        )
        .method(
            MethodSpec::new("divide")
                .param(ParamType::Float)
                .param(ParamType::Float)
                .returns(ParamType::Float)
                .safe("Divides the first number by the second"),
            |args| {
                let divisor = float(args, 1);
                if divisor == 0.0 {
                    return Err("division by zero".into());
                }
                Ok(Arg::Float(float(args, 0) / divisor))
            },
        )
        .method(MethodSpec::new("fail"), |_| Err("this method always fails".into()))
        .method(MethodSpec::new("panic"), |_| panic!("fixture panicked"))
        .build()
}

fn caller_methods(context: Arc<OnceLock<PluginContext>>) -> Result<MethodTable, MethodTableError> {
    let count = |active_only: bool| {
        let context = Arc::clone(&context);
        move |_: &[Arg]| -> Result<Arg, ExtensionError> {
            let listed = context.get().map(PluginContext::plugins).unwrap_or_default();
            let count = listed.iter().filter(|p| p.active || !active_only).count();
            Ok(Arg::Int(i64::try_from(count).unwrap_or(i64::MAX)))
        }
    };

    MethodTable::builder()
        .method(
            MethodSpec::new("count_active_plugins")
                .returns(ParamType::Int)
                .safe("Counts active plugins"),
            count(true),
        )
        .method(
            MethodSpec::new("count_total_plugins")
                .returns(ParamType::Int)
                .safe("Counts uploaded plugins"),
            count(false),
        )
        .method(
            MethodSpec::new("format_heading")
                .param(ParamType::String)
                .returns(ParamType::String)
                .safe("Upper-cases a heading through the Echo Plugin"),
            move |args| {
                let target = Fixture::Echo.display_name();
                let Some(context) = context.get() else {
                    return Ok(Arg::Str(format!("Error: {target} not found")));
                };
                let Some(id) = context.resolve(target) else {
                    return Ok(Arg::Str(format!("Error: {target} not found")));
                };
                let shouted = context
                    .call(id, "shout", &[text(args, 0).into()])
                    .map_err(|e| ExtensionError::new(e.to_string()))?;
                Ok(Arg::Str(format!(
                    "[[ {} ]]",
                    shouted.as_str().unwrap_or_default()
                )))
            },
        )
        .build()
}

fn broken_processor_methods() -> Result<MethodTable, MethodTableError> {
    MethodTable::builder()
        .method(
            MethodSpec::new("upper")
                .param(ParamType::String)
                .returns(ParamType::String)
                .safe("Always fails"),
            |_| Err("string processing is unavailable".into()),
        )
        .build()
}

fn clash_methods() -> Result<MethodTable, MethodTableError> {
    MethodTable::builder()
        .method(
            MethodSpec::new("add").param(ParamType::Int),
            |_| Ok(Arg::Null),
        )
        .method(
            MethodSpec::new("add").param(ParamType::String),
            |_| Ok(Arg::Null),
        )
        .build()
}
