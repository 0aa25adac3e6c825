//! Straight-line game scripts driven through a [GameOrchestrator].
use crate::{Error, GameOrchestrator, Ledger, Outcome, Result, RoleBook};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use werewolf_types::{Action, Address, GameId, Role};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub label: String,
    pub action: Action,
    /// Signing account; any registered account when unset.
    pub actor: Option<Address>,
}

impl Step {
    pub fn new(label: impl Into<String>, action: Action, actor: Option<&Address>) -> Self {
        Self {
            label: label.into(),
            action,
            actor: actor.cloned(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub confirmed: usize,
    pub sentinels: usize,
}

/// One night and one day with every role seated. Needs an account for each
/// role.
///
/// The werewolf's attack on the seer lands on the guard's protection and is
/// expected to come back as a sentinel; the village then votes the werewolf
/// out.
pub fn reference(book: &RoleBook) -> Result<Vec<Step>> {
    let werewolf = book.first(Role::Werewolf)?;
    let witch = book.first(Role::Witch)?;
    let guard = book.first(Role::Guard)?;
    let seer = book.first(Role::Seer)?;
    let hunter = book.first(Role::Hunter)?;
    let cupid = book.first(Role::Cupid)?;
    let villager = book.first(Role::Villager)?;

    let mut steps = vec![
        Step::new(
            "start game",
            Action::StartGame {
                players: book.seating(),
            },
            Some(werewolf),
        ),
        Step::new(
            "cupid links seer and villager",
            Action::CupidAction {
                lover1: seer.clone(),
                lover2: villager.clone(),
            },
            Some(cupid),
        ),
        Step::new(
            "guard protects seer",
            Action::NightAction {
                target: seer.clone(),
            },
            Some(guard),
        ),
        Step::new(
            "werewolf attacks seer",
            Action::NightAction {
                target: seer.clone(),
            },
            Some(werewolf),
        ),
        Step::new(
            "seer inspects werewolf",
            Action::NightAction {
                target: werewolf.clone(),
            },
            Some(seer),
        ),
        Step::new(
            "witch keeps her potions",
            Action::WitchAction {
                target: villager.clone(),
                save: false,
                poison: false,
            },
            Some(witch),
        ),
        Step::new("pass night", Action::PassNight, None),
    ];

    for voter in [witch, guard, seer, hunter, cupid, villager] {
        steps.push(Step::new(
            format!("{voter} votes werewolf"),
            Action::Vote {
                target: werewolf.clone(),
            },
            Some(voter),
        ));
    }
    steps.push(Step::new(
        "werewolf votes villager",
        Action::Vote {
            target: villager.clone(),
        },
        Some(werewolf),
    ));
    steps.push(Step::new("end voting", Action::EndVoting, None));
    steps.push(Step::new("pass day", Action::PassDay, None));
    Ok(steps)
}

/// Run `steps` in order, pausing `delay` between them. Sentinels are expected
/// rejections and do not stop the run; a failed step aborts it.
pub async fn run<L: Ledger>(
    orchestrator: &mut GameOrchestrator<L>,
    game_id: GameId,
    steps: &[Step],
    delay: Duration,
) -> Result<Report> {
    let mut report = Report::default();
    for (index, step) in steps.iter().enumerate() {
        if index > 0 && !delay.is_zero() {
            sleep(delay).await;
        }
        let outcome = orchestrator
            .dispatch(game_id, step.action.clone(), step.actor.as_ref())
            .await?;
        match outcome {
            Outcome::Confirmed(handle) => {
                info!(game_id, step = %step.label, %handle, phase = %orchestrator.phase(game_id), "step confirmed");
                report.confirmed += 1;
            }
            Outcome::Sentinel { reason } => {
                info!(game_id, step = %step.label, %reason, "step rejected as expected");
                report.sentinels += 1;
            }
            Outcome::Failed(failure) => {
                warn!(game_id, step = %step.label, %failure, "aborting scenario");
                return Err(Error::Aborted {
                    step: step.label.clone(),
                    failure,
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accounts::signing_key_from_seed, mocks::MockLedger, AccountRegistry, ErrorClassifier,
        Failure, RetryExecutor, RetryPolicy,
    };
    use werewolf_types::{ActionKind, ContractAbi, Phase};

    fn setup() -> (GameOrchestrator<MockLedger>, RoleBook) {
        let mut registry = AccountRegistry::new();
        let mut book = RoleBook::default();
        for (seed, role) in Role::ALL.into_iter().enumerate() {
            let address = Address::new(format!("0x{role}"));
            registry.register(address.clone(), signing_key_from_seed(seed as u64));
            book.insert(role, address);
        }
        let orchestrator = GameOrchestrator::new(
            MockLedger::new(),
            registry,
            Address::from("0xc0ffee"),
            &ContractAbi::werewolf(),
            RetryExecutor::new(
                ErrorClassifier::default(),
                RetryPolicy::new(3, Duration::ZERO),
            ),
        )
        .unwrap();
        (orchestrator, book)
    }

    #[test]
    fn reference_needs_every_role() {
        let mut book = RoleBook::default();
        book.insert(Role::Werewolf, Address::from("0xw"));
        assert!(matches!(reference(&book), Err(Error::Config(_))));
    }

    #[test]
    fn reference_covers_one_round() {
        let (_, book) = setup();
        let steps = reference(&book).unwrap();
        let kinds: Vec<ActionKind> = steps.iter().map(|step| step.action.kind()).collect();
        assert_eq!(kinds.first(), Some(&ActionKind::StartGame));
        assert_eq!(kinds.last(), Some(&ActionKind::PassDay));
        assert_eq!(
            kinds.iter().filter(|kind| **kind == ActionKind::Vote).count(),
            7
        );
        let Action::StartGame { players } = &steps[0].action else {
            panic!("first step must start the game");
        };
        assert_eq!(players.len(), Role::ALL.len());
    }

    #[tokio::test]
    async fn protected_attack_does_not_stop_run() {
        let (mut orchestrator, book) = setup();
        let werewolf = book.first(Role::Werewolf).unwrap().clone();
        orchestrator.ledger().fail_from(
            &werewolf,
            "night_action",
            "Transaction execution error: Target protected",
        );
        let steps = reference(&book).unwrap();

        let report = run(&mut orchestrator, 11, &steps, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(
            report,
            Report {
                confirmed: steps.len() - 1,
                sentinels: 1,
            }
        );
        assert_eq!(orchestrator.ledger().attempts("night_action"), 3);
        assert_eq!(orchestrator.phase(11), Phase::Night);
    }

    #[tokio::test]
    async fn failed_step_aborts_run() {
        let (mut orchestrator, book) = setup();
        orchestrator.ledger().fail_always("pass_night", "Wrong phase");
        let steps = reference(&book).unwrap();

        let err = run(&mut orchestrator, 1, &steps, Duration::ZERO)
            .await
            .unwrap_err();
        let Error::Aborted { step, failure } = err else {
            panic!("expected abort, got {err:?}");
        };
        assert_eq!(step, "pass night");
        assert!(matches!(failure, Failure::Unclassified(_)));
        assert_eq!(orchestrator.ledger().attempts("vote"), 0);
        assert_eq!(orchestrator.phase(1), Phase::Night);
    }
}
