//! Turn executor
//!
//! Feeds one user message through the pure transition function, executing
//! each effect against the role gateway until the turn completes.

use super::TurnError;
use crate::roles::{Role, RoleGateway, RoleOutput};
use crate::state_machine::{transition, Effect, Event, TransitionError, Turn, TurnContext, TurnState};
use std::time::Instant;

/// Score and mastery reported by the evaluator, if it ran this turn
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    pub score: f64,
    pub mastery_update: Option<String>,
}

/// Outcome of a completed turn, before it is persisted
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub state: TurnState,
    /// Roles invoked, in order
    pub roles: Vec<Role>,
    pub evaluation: Option<EvaluationSummary>,
}

impl TurnReport {
    /// The role whose output produced the response; `None` for direct replies
    pub fn handled_by(&self) -> Option<Role> {
        self.roles
            .iter()
            .rev()
            .copied()
            .find(|role| *role != Role::Classifier)
    }
}

/// Runs a single turn for one thread
pub struct TurnExecutor<'a, G: RoleGateway + ?Sized> {
    gateway: &'a G,
    context: &'a TurnContext,
    turn: Turn,
    roles: Vec<Role>,
    evaluation: Option<EvaluationSummary>,
}

impl<'a, G: RoleGateway + ?Sized> TurnExecutor<'a, G> {
    pub fn new(gateway: &'a G, context: &'a TurnContext, state: TurnState) -> Self {
        Self {
            gateway,
            context,
            turn: Turn::start(state),
            roles: Vec::new(),
            evaluation: None,
        }
    }

    pub async fn run(mut self, message: String) -> Result<TurnReport, TurnError> {
        self.process_event(Event::user_message(message)).await?;

        if !self.turn.is_done() {
            return Err(TransitionError::InvalidTransition(format!(
                "turn stopped in {}",
                self.turn.phase.name()
            ))
            .into());
        }

        Ok(TurnReport {
            state: self.turn.state,
            roles: self.roles,
            evaluation: self.evaluation,
        })
    }

    async fn process_event(&mut self, event: Event) -> Result<(), TurnError> {
        // Role outputs chain into further transitions until the turn is done
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let result = transition(&self.turn, self.context, current_event)?;
            self.turn = result.new_turn;

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect).await? {
                    events_to_process.push(generated_event);
                }
            }
        }

        Ok(())
    }

    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, TurnError> {
        match effect {
            Effect::InvokeRole(request) => {
                let role = request.role();
                let started = Instant::now();
                let output = self.gateway.invoke(request).await?;

                tracing::info!(
                    thread_id = %self.turn.state.thread_id,
                    %role,
                    duration_ms = %started.elapsed().as_millis(),
                    "Role completed"
                );

                self.roles.push(role);
                if let RoleOutput::Evaluation(evaluation) = &output {
                    self.evaluation = Some(EvaluationSummary {
                        score: evaluation.correctness,
                        mastery_update: evaluation.mastery_update.clone(),
                    });
                }
                Ok(Some(output.into()))
            }

            Effect::CompleteTurn => {
                tracing::debug!(
                    thread_id = %self.turn.state.thread_id,
                    next_action = self.turn.state.next_action.as_str(),
                    "Turn complete"
                );
                Ok(None)
            }
        }
    }
}
