// Remote methods live on different components and modules depending on the
// game build, so every call is an ordered list of candidate descriptors tried
// until one answers. Failures are expected and only logged at trace level.

use tracing::trace;

use crate::domain::{AutomationDriver, CallArg, EntityId, MethodCall, RemoteValue};
use crate::use_cases::session::Session;

/// Candidates with the component as the outer loop: every module is tried for
/// the first component before moving on. Blank component names are skipped.
pub fn by_component(components: &[&str], modules: &[&str], method: &str, args: &[CallArg]) -> Vec<MethodCall> {
    components
        .iter()
        .filter(|c| !c.is_empty())
        .flat_map(|component| {
            modules
                .iter()
                .map(move |module| MethodCall::new(*component, method, *module).args(args.iter().cloned()))
        })
        .collect()
}

/// Candidates with the module as the outer loop.
pub fn by_module(modules: &[&str], components: &[&str], method: &str, args: &[CallArg]) -> Vec<MethodCall> {
    modules
        .iter()
        .flat_map(|module| {
            components
                .iter()
                .filter(|c| !c.is_empty())
                .map(move |component| MethodCall::new(*component, method, *module).args(args.iter().cloned()))
        })
        .collect()
}

/// Candidates from explicit `(component, module)` pairs, in order.
pub fn by_pairs(pairs: &[(&str, &str)], method: &str, args: &[CallArg]) -> Vec<MethodCall> {
    pairs
        .iter()
        .filter(|(component, _)| !component.is_empty())
        .map(|(component, module)| MethodCall::new(*component, method, *module).args(args.iter().cloned()))
        .collect()
}

/// Remote ids use 0 for "none".
pub fn as_entity_id(value: &RemoteValue) -> Option<EntityId> {
    value.as_i64().filter(|id| *id != 0)
}

impl<D> Session<D>
where
    D: AutomationDriver,
{
    /// First accepted answer from `calls` made on `target`. A call that fails
    /// or whose result is rejected moves on to the next candidate.
    pub(crate) async fn first_component_answer<T, F>(
        &self,
        target: EntityId,
        calls: &[MethodCall],
        accept: F,
    ) -> Option<T>
    where
        F: Fn(&RemoteValue) -> Option<T>,
    {
        for call in calls {
            match self.driver.call_component_method(target, call).await {
                Ok(value) => {
                    if let Some(answer) = accept(&value) {
                        return Some(answer);
                    }
                    trace!(entity = target, %call, ?value, "answer rejected");
                }
                Err(err) => trace!(entity = target, %call, error = %err, "call failed"),
            }
        }
        None
    }

    pub(crate) async fn first_static_answer<T, F>(&self, calls: &[MethodCall], accept: F) -> Option<T>
    where
        F: Fn(&RemoteValue) -> Option<T>,
    {
        for call in calls {
            match self.driver.call_static_method(call).await {
                Ok(value) => {
                    if let Some(answer) = accept(&value) {
                        return Some(answer);
                    }
                    trace!(%call, ?value, "answer rejected");
                }
                Err(err) => trace!(%call, error = %err, "static call failed"),
            }
        }
        None
    }

    /// True once any candidate call on `target` completes without error.
    pub(crate) async fn first_component_success(&self, target: EntityId, calls: &[MethodCall]) -> bool {
        self.first_component_answer(target, calls, |_| Some(()))
            .await
            .is_some()
    }

    pub(crate) async fn first_static_success(&self, calls: &[MethodCall]) -> bool {
        self.first_static_answer(calls, |_| Some(())).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(calls: &[MethodCall]) -> Vec<String> {
        calls
            .iter()
            .map(|c| format!("{}@{}", c.component, c.module))
            .collect()
    }

    #[test]
    fn component_outer_order() {
        let calls = by_component(&["Pawn", "", "Actor"], &["Engine", ""], "GetController", &[]);
        assert_eq!(labels(&calls), vec!["Pawn@Engine", "Pawn@", "Actor@Engine", "Actor@"]);
        assert!(calls.iter().all(|c| c.method == "GetController"));
    }

    #[test]
    fn module_outer_order_keeps_args() {
        let calls = by_module(
            &["LyraGame", "Core"],
            &["LyraTestSupportSubsystem", "Sub"],
            "SetContinuousAimFireEnabled",
            &[CallArg::Bool(true)],
        );
        assert_eq!(
            labels(&calls),
            vec![
                "LyraTestSupportSubsystem@LyraGame",
                "Sub@LyraGame",
                "LyraTestSupportSubsystem@Core",
                "Sub@Core"
            ]
        );
        assert!(calls.iter().all(|c| c.args == vec![CallArg::Bool(true)]));
    }

    #[test]
    fn pairs_skip_blank_components() {
        let calls = by_pairs(&[("Controller", "Engine"), ("", "Engine")], "SetControlRotation", &[]);
        assert_eq!(labels(&calls), vec!["Controller@Engine"]);
    }

    #[test]
    fn zero_id_is_no_answer() {
        assert_eq!(as_entity_id(&RemoteValue::Int(0)), None);
        assert_eq!(as_entity_id(&RemoteValue::Int(17)), Some(17));
        assert_eq!(as_entity_id(&RemoteValue::Str("17".into())), None);
    }
}
