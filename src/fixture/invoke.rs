//! Bounded invocation of fixture and test bodies

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::engine::EngineServices;
use crate::executor::{ExecutionUnit, UnitLabel};
use crate::models::{Instance, InstanceFn, StaticFn, TestClassInfo, TestContext};
use crate::results::{
    classify_error, classify_interruption, classify_panic, classify_run, Classified, Phase,
};

/// What is being invoked and under which bound
#[derive(Clone, Debug)]
pub struct Call {
    pub label: UnitLabel,
    pub phase: Phase,
    pub timeout: Option<Duration>,
}

impl Call {
    pub fn new(declaring_type: &str, method: &str, phase: Phase) -> Self {
        Self {
            label: UnitLabel::new(declaring_type, method),
            phase,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Run an assembly/class level body. `None` means it succeeded.
pub async fn invoke_static(
    services: &EngineServices,
    call: Call,
    body: &StaticFn,
    ctx: &TestContext,
    cancel: &CancellationToken,
) -> Option<Classified> {
    let body = body.clone();
    let ctx = ctx.clone();
    let capture = ctx.capture().clone();

    let unit = ExecutionUnit::new(call.label.clone(), cancel.clone(), move |token| {
        let ctx = ctx.with_cancellation(token);
        body(&ctx)
    })
    .with_timeout(call.timeout)
    .with_capture(capture);

    classify_run(services.runner.run(unit).await, call.phase, &call.label)
}

/// Run a body that takes the test instance. `None` means it succeeded.
pub async fn invoke_instance(
    services: &EngineServices,
    call: Call,
    body: &InstanceFn,
    instance: &Instance,
    ctx: &TestContext,
    cancel: &CancellationToken,
) -> Option<Classified> {
    let body = body.clone();
    let instance = instance.clone();
    let ctx = ctx.clone();
    let capture = ctx.capture().clone();

    let unit = ExecutionUnit::new(call.label.clone(), cancel.clone(), move |token| {
        let ctx = ctx.with_cancellation(token);
        body(&instance, &ctx)
    })
    .with_timeout(call.timeout)
    .with_capture(capture);

    classify_run(services.runner.run(unit).await, call.phase, &call.label)
}

/// Create the instance a row invocation runs against
pub async fn create_instance(
    services: &EngineServices,
    class: &TestClassInfo,
    ctx: &TestContext,
    cancel: &CancellationToken,
) -> Result<Instance, Classified> {
    let label = UnitLabel::new(class.name.clone(), "new");
    let factory = class.factory.clone();
    let ctx = ctx.clone();
    let capture = ctx.capture().clone();

    let unit = ExecutionUnit::new(label.clone(), cancel.clone(), move |token| {
        let ctx = ctx.with_cancellation(token);
        factory(&ctx)
    })
    .with_capture(capture);

    match services.runner.run(unit).await {
        Ok(Ok(Ok(instance))) => Ok(instance),
        Ok(Ok(Err(error))) => Err(classify_error(error, Phase::InstanceCreation, &label)),
        Ok(Err(payload)) => Err(classify_panic(payload, Phase::InstanceCreation, &label)),
        Err(interruption) => Err(classify_interruption(&interruption)),
    }
}
