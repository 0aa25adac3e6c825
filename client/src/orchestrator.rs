//! Dispatches game actions to the ledger and mirrors each game's phase.
use crate::{
    AccountIdentity, AccountRegistry, Call, Error, Ledger, Outcome, Result, RetryExecutor,
    RetryPolicy, TransactionOutcome, GAME_EXISTS, TARGET_PROTECTED,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};
use werewolf_types::{
    api::{GameView, TransactionOptions},
    Action, ActionKind, Address, ContractAbi, Entrypoints, GameId, Phase,
};

/// Submits one action at a time; callers must not overlap actions on the
/// same game.
pub struct GameOrchestrator<L: Ledger> {
    ledger: L,
    accounts: AccountRegistry,
    contract: Address,
    entrypoints: Entrypoints,
    executor: RetryExecutor,
    options: TransactionOptions,
    phases: HashMap<GameId, Phase>,
}

impl<L: Ledger> GameOrchestrator<L> {
    pub fn new(
        ledger: L,
        accounts: AccountRegistry,
        contract: Address,
        abi: &ContractAbi,
        executor: RetryExecutor,
    ) -> Result<Self> {
        Ok(Self {
            ledger,
            accounts,
            contract,
            entrypoints: Entrypoints::from_abi(abi)?,
            executor,
            options: TransactionOptions::latest(),
            phases: HashMap::new(),
        })
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn accounts(&self) -> &AccountRegistry {
        &self.accounts
    }

    /// Locally mirrored phase of `game_id`.
    pub fn phase(&self, game_id: GameId) -> Phase {
        self.phases.get(&game_id).copied().unwrap_or_default()
    }

    pub async fn start_game(
        &mut self,
        game_id: GameId,
        players: Vec<Address>,
        actor: &Address,
    ) -> Result<TransactionOutcome> {
        self.dispatch(game_id, Action::StartGame { players }, Some(actor))
            .await
    }

    pub async fn vote(
        &mut self,
        game_id: GameId,
        target: &Address,
        voter: &Address,
    ) -> Result<TransactionOutcome> {
        let action = Action::Vote {
            target: target.clone(),
        };
        self.dispatch(game_id, action, Some(voter)).await
    }

    pub async fn night_action(
        &mut self,
        game_id: GameId,
        target: &Address,
        actor: &Address,
    ) -> Result<TransactionOutcome> {
        let action = Action::NightAction {
            target: target.clone(),
        };
        self.dispatch(game_id, action, Some(actor)).await
    }

    pub async fn cupid_action(
        &mut self,
        game_id: GameId,
        lover1: &Address,
        lover2: &Address,
        actor: &Address,
    ) -> Result<TransactionOutcome> {
        let action = Action::CupidAction {
            lover1: lover1.clone(),
            lover2: lover2.clone(),
        };
        self.dispatch(game_id, action, Some(actor)).await
    }

    pub async fn witch_action(
        &mut self,
        game_id: GameId,
        target: &Address,
        save: bool,
        poison: bool,
        actor: &Address,
    ) -> Result<TransactionOutcome> {
        let action = Action::WitchAction {
            target: target.clone(),
            save,
            poison,
        };
        self.dispatch(game_id, action, Some(actor)).await
    }

    pub async fn hunter_action(
        &mut self,
        game_id: GameId,
        target: &Address,
        actor: &Address,
    ) -> Result<TransactionOutcome> {
        let action = Action::HunterAction {
            target: target.clone(),
        };
        self.dispatch(game_id, action, Some(actor)).await
    }

    /// Without an `actor`, any registered account signs.
    pub async fn pass_night(
        &mut self,
        game_id: GameId,
        actor: Option<&Address>,
    ) -> Result<TransactionOutcome> {
        self.dispatch(game_id, Action::PassNight, actor).await
    }

    pub async fn pass_day(
        &mut self,
        game_id: GameId,
        actor: Option<&Address>,
    ) -> Result<TransactionOutcome> {
        self.dispatch(game_id, Action::PassDay, actor).await
    }

    pub async fn end_voting(
        &mut self,
        game_id: GameId,
        actor: Option<&Address>,
    ) -> Result<TransactionOutcome> {
        self.dispatch(game_id, Action::EndVoting, actor).await
    }

    /// Submit `action` under the policy for its kind: night actions get a single
    /// attempt, everything else the executor's default.
    pub async fn dispatch(
        &mut self,
        game_id: GameId,
        action: Action,
        actor: Option<&Address>,
    ) -> Result<TransactionOutcome> {
        let policy = match action.kind() {
            ActionKind::NightAction => self.executor.policy().single_attempt(),
            _ => self.executor.policy().clone(),
        };
        self.dispatch_with(game_id, action, actor, &policy).await
    }

    pub async fn dispatch_with(
        &mut self,
        game_id: GameId,
        action: Action,
        actor: Option<&Address>,
        policy: &RetryPolicy,
    ) -> Result<TransactionOutcome> {
        let kind = action.kind();
        let outcome = {
            let signer = match actor {
                Some(address) => self.accounts.resolve(address)?,
                None => self.accounts.any()?,
            };
            if kind == ActionKind::StartGame && self.game_exists(game_id).await {
                info!(game_id, "game already exists; not submitting");
                return Ok(Outcome::Sentinel {
                    reason: GAME_EXISTS.to_string(),
                });
            }
            let call = Call {
                entrypoint: self.entrypoints.action(kind).to_string(),
                calldata: action.calldata(game_id),
            };
            let outcome = self.submit(&call, signer, policy).await;
            match kind {
                ActionKind::NightAction => protected_as_sentinel(outcome),
                _ => outcome,
            }
        };

        match &outcome {
            Outcome::Confirmed(handle) => {
                debug!(game_id, action = %kind, %handle, "action confirmed");
                if kind == ActionKind::StartGame || kind.is_phase_transition() {
                    self.advance(game_id, kind);
                }
            }
            Outcome::Sentinel { reason } => {
                info!(game_id, action = %kind, %reason, "action rejected with sentinel");
            }
            Outcome::Failed(failure) => {
                info!(game_id, action = %kind, %failure, "action failed");
            }
        }
        Ok(outcome)
    }

    /// Overwrite the mirrored phase with the ledger's.
    pub async fn sync_phase(&mut self, game_id: GameId) -> Result<Phase> {
        let state = self
            .ledger
            .query_state(
                &self.contract,
                self.entrypoints.get_game(),
                &[Value::from(game_id)],
            )
            .await?;
        let view: GameView = serde_json::from_value(state)
            .map_err(|err| Error::UnexpectedResponse(err.to_string()))?;
        let previous = self.phases.insert(game_id, view.phase).unwrap_or_default();
        if previous != view.phase {
            info!(game_id, from = %previous, to = %view.phase, "phase synced from ledger");
        }
        Ok(view.phase)
    }

    async fn game_exists(&self, game_id: GameId) -> bool {
        match self
            .ledger
            .query_state(
                &self.contract,
                self.entrypoints.get_game(),
                &[Value::from(game_id)],
            )
            .await
        {
            Ok(_) => true,
            Err(err) => {
                debug!(game_id, error = %err, "no existing game state");
                false
            }
        }
    }

    async fn submit(
        &self,
        call: &Call,
        signer: &AccountIdentity,
        policy: &RetryPolicy,
    ) -> TransactionOutcome {
        let ledger = &self.ledger;
        let contract = &self.contract;
        let options = &self.options;
        self.executor
            .run_with(policy, move || async move {
                let handle = ledger.submit(contract, call, signer, options).await?;
                ledger.await_confirmation(&handle).await?;
                Ok(handle)
            })
            .await
    }

    fn advance(&mut self, game_id: GameId, kind: ActionKind) {
        let current = self.phase(game_id);
        if let Some(next) = kind.next_phase(current) {
            self.phases.insert(game_id, next);
            if next != current {
                info!(game_id, from = %current, to = %next, "phase advanced");
            }
        }
    }
}

/// A night action that failed because its target is protected is reported as a
/// sentinel regardless of the classifier table in use.
fn protected_as_sentinel(outcome: TransactionOutcome) -> TransactionOutcome {
    match outcome {
        Outcome::Failed(failure)
            if failure
                .error()
                .message
                .to_lowercase()
                .contains("target protected") =>
        {
            Outcome::Sentinel {
                reason: TARGET_PROTECTED.to_string(),
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        accounts::signing_key_from_seed, classifier::Class, mocks::MockLedger, ErrorClassifier,
        Failure, Rule,
    };
    use serde_json::json;
    use std::time::Duration;
    use werewolf_types::api::TransactionVersion;

    fn address(name: &str) -> Address {
        Address::from(name)
    }

    fn orchestrator(names: &[&str]) -> GameOrchestrator<MockLedger> {
        let mut accounts = AccountRegistry::new();
        for (seed, name) in names.iter().enumerate() {
            accounts.register(address(name), signing_key_from_seed(seed as u64));
        }
        let executor = RetryExecutor::new(
            ErrorClassifier::default(),
            RetryPolicy::new(5, Duration::ZERO),
        );
        GameOrchestrator::new(
            MockLedger::new(),
            accounts,
            address("0xc0ffee"),
            &ContractAbi::werewolf(),
            executor,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn start_game_on_existing_game_skips_submission() {
        let mut orchestrator = orchestrator(&["0xa", "0xb"]);
        orchestrator
            .ledger()
            .set_state(42, json!({ "game_id": 42, "phase": "day" }));

        let outcome = orchestrator
            .start_game(42, vec![address("0xa"), address("0xb")], &address("0xa"))
            .await
            .unwrap();
        assert_eq!(outcome.sentinel(), Some(GAME_EXISTS));
        assert_eq!(orchestrator.ledger().attempts("start_game"), 0);
        assert_eq!(orchestrator.ledger().queries(), 1);
        assert_eq!(orchestrator.phase(42), Phase::Lobby);
    }

    #[tokio::test]
    async fn protected_target_is_sentinel_without_retry() {
        let mut orchestrator = orchestrator(&["0xwolf", "0xseer"]);
        orchestrator.ledger().fail_always(
            "night_action",
            "Transaction execution error: Failure reason: 'Target protected'",
        );

        let outcome = orchestrator
            .night_action(7, &address("0xseer"), &address("0xwolf"))
            .await
            .unwrap();
        assert_eq!(outcome.sentinel(), Some(TARGET_PROTECTED));
        assert_eq!(orchestrator.ledger().attempts("night_action"), 1);
    }

    #[tokio::test]
    async fn night_action_gets_a_single_attempt() {
        let mut orchestrator = orchestrator(&["0xwolf", "0xseer"]);
        orchestrator
            .ledger()
            .fail_always("night_action", "request timed out");

        let outcome = orchestrator
            .night_action(7, &address("0xseer"), &address("0xwolf"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Failed(Failure::Exhausted { attempts: 1, .. })
        ));
        assert_eq!(orchestrator.ledger().attempts("night_action"), 1);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_for_other_actions() {
        let mut orchestrator = orchestrator(&["0xa", "0xb"]);
        orchestrator
            .ledger()
            .fail_next("vote", "Invalid transaction nonce: expected 2, got 1");
        orchestrator.ledger().fail_next("vote", "node unavailable");

        let outcome = orchestrator
            .vote(1, &address("0xb"), &address("0xa"))
            .await
            .unwrap();
        assert!(outcome.is_confirmed());
        assert_eq!(orchestrator.ledger().attempts("vote"), 3);
        assert_eq!(orchestrator.ledger().submitted().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_failed() {
        let mut orchestrator = orchestrator(&["0xa"]);
        orchestrator.ledger().fail_always("pass_day", "node unavailable");

        let outcome = orchestrator.pass_day(1, None).await.unwrap();
        let Outcome::Failed(Failure::Exhausted { attempts, last }) = outcome else {
            panic!("expected exhaustion, got {outcome:?}");
        };
        assert_eq!(attempts, 5);
        assert_eq!(last.message, "node unavailable");
        assert_eq!(orchestrator.phase(1), Phase::Lobby);
    }

    #[tokio::test]
    async fn confirmation_failure_is_retried() {
        let mut orchestrator = orchestrator(&["0xa"]);
        orchestrator
            .ledger()
            .fail_next_confirmation("confirmation timed out for 0x1");

        let outcome = orchestrator.pass_night(1, None).await.unwrap();
        assert!(outcome.is_confirmed());
        assert_eq!(orchestrator.ledger().attempts("pass_night"), 2);
        assert_eq!(orchestrator.ledger().confirmations(), 1);
    }

    #[tokio::test]
    async fn unknown_actor_is_an_error() {
        let mut orchestrator = orchestrator(&["0xa"]);
        let err = orchestrator
            .vote(1, &address("0xa"), &address("0xnobody"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(address) if address.as_str() == "0xnobody"));
        assert_eq!(orchestrator.ledger().attempts("vote"), 0);
    }

    #[tokio::test]
    async fn anonymous_action_without_accounts_is_an_error() {
        let mut orchestrator = orchestrator(&[]);
        let err = orchestrator.end_voting(1, None).await.unwrap_err();
        assert!(matches!(err, Error::NoAccountsAvailable));
    }

    #[tokio::test]
    async fn anonymous_action_is_signed_by_first_account() {
        let mut orchestrator = orchestrator(&["0xb", "0xa"]);
        orchestrator.end_voting(1, None).await.unwrap();
        let submitted = orchestrator.ledger().submitted();
        assert_eq!(submitted[0].sender, address("0xb"));
        assert_eq!(submitted[0].version, TransactionVersion::LATEST);
        assert_eq!(submitted[0].call.entrypoint, "end_voting");
        assert_eq!(submitted[0].call.calldata, json!({ "game_id": 1 }));
    }

    #[tokio::test]
    async fn phase_follows_confirmed_transitions() {
        let mut orchestrator = orchestrator(&["0xa", "0xb"]);
        let (a, b) = (address("0xa"), address("0xb"));
        assert_eq!(orchestrator.phase(1), Phase::Lobby);

        orchestrator
            .start_game(1, vec![a.clone(), b.clone()], &a)
            .await
            .unwrap();
        assert_eq!(orchestrator.phase(1), Phase::Night);

        orchestrator.night_action(1, &b, &a).await.unwrap();
        assert_eq!(orchestrator.phase(1), Phase::Night);

        orchestrator.pass_night(1, None).await.unwrap();
        assert_eq!(orchestrator.phase(1), Phase::Day);

        orchestrator.vote(1, &b, &a).await.unwrap();
        assert_eq!(orchestrator.phase(1), Phase::Day);

        orchestrator.end_voting(1, Some(&b)).await.unwrap();
        assert_eq!(orchestrator.phase(1), Phase::Day);

        orchestrator.pass_day(1, None).await.unwrap();
        assert_eq!(orchestrator.phase(1), Phase::Night);

        // Other games are unaffected
        assert_eq!(orchestrator.phase(2), Phase::Lobby);
    }

    #[tokio::test]
    async fn failed_transition_keeps_phase() {
        let mut orchestrator = orchestrator(&["0xa", "0xb"]);
        let (a, b) = (address("0xa"), address("0xb"));
        orchestrator
            .start_game(1, vec![a.clone(), b], &a)
            .await
            .unwrap();
        orchestrator.ledger().fail_next("pass_night", "Wrong phase");

        let outcome = orchestrator.pass_night(1, None).await.unwrap();
        assert!(matches!(outcome, Outcome::Failed(Failure::Unclassified(_))));
        assert_eq!(orchestrator.phase(1), Phase::Night);
    }

    #[tokio::test]
    async fn sync_phase_adopts_ledger_phase() {
        let mut orchestrator = orchestrator(&["0xa"]);
        orchestrator.ledger().set_state(
            5,
            json!({
                "game_id": 5,
                "phase": "day",
                "round": 3,
                "voting_open": true,
                "players": [],
            }),
        );
        assert_eq!(orchestrator.sync_phase(5).await.unwrap(), Phase::Day);
        assert_eq!(orchestrator.phase(5), Phase::Day);

        let err = orchestrator.sync_phase(6).await.unwrap_err();
        assert!(matches!(err, Error::Ledger(_)));
    }

    #[tokio::test]
    async fn policy_override_applies_per_call() {
        let mut orchestrator = orchestrator(&["0xa"]);
        orchestrator.ledger().fail_always("pass_day", "request timed out");

        let policy = RetryPolicy::new(2, Duration::ZERO);
        let outcome = orchestrator
            .dispatch_with(1, Action::PassDay, None, &policy)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Failed(Failure::Exhausted { attempts: 2, .. })
        ));
        assert_eq!(orchestrator.ledger().attempts("pass_day"), 2);
    }

    #[tokio::test]
    async fn protected_target_survives_custom_classifier() {
        let mut accounts = AccountRegistry::new();
        accounts.register(address("0xwolf"), signing_key_from_seed(0));
        let executor = RetryExecutor::new(
            ErrorClassifier::new(vec![Rule::message("timed out", Class::Transient)]),
            RetryPolicy::new(3, Duration::ZERO),
        );
        let mut orchestrator = GameOrchestrator::new(
            MockLedger::new(),
            accounts,
            address("0xc0ffee"),
            &ContractAbi::werewolf(),
            executor,
        )
        .unwrap();
        orchestrator.ledger().fail_always(
            "night_action",
            "Transaction execution error: Target protected",
        );
        orchestrator
            .ledger()
            .fail_always("vote", "Transaction execution error: Target protected");

        let outcome = orchestrator
            .night_action(7, &address("0xseer"), &address("0xwolf"))
            .await
            .unwrap();
        assert_eq!(outcome.sentinel(), Some(TARGET_PROTECTED));
        assert_eq!(orchestrator.ledger().attempts("night_action"), 1);

        let outcome = orchestrator
            .vote(7, &address("0xseer"), &address("0xwolf"))
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Failed(Failure::Unclassified(_))));
        assert_eq!(orchestrator.ledger().attempts("vote"), 1);
    }
}
