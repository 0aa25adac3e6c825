//! In-memory werewolf game contract.
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use werewolf_types::{
    api::{GameView, PlayerView},
    Action, Address, GameId, Phase, Role,
};

/// Reason a call was reverted by the contract.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Revert {
    #[error("Game already exists")]
    GameExists,
    #[error("Game not found")]
    GameNotFound,
    #[error("Not enough players")]
    NotEnoughPlayers,
    #[error("Duplicate player")]
    DuplicatePlayer,
    #[error("Not a player")]
    NotAPlayer,
    #[error("Player is dead")]
    PlayerDead,
    #[error("Target is dead")]
    TargetDead,
    #[error("Wrong phase")]
    WrongPhase,
    #[error("Role has no night action")]
    NoNightAction,
    #[error("Target protected")]
    TargetProtected,
    #[error("Voting closed")]
    VotingClosed,
    #[error("Hunter cannot shoot")]
    HunterCannotShoot,
    #[error("Not cupid")]
    NotCupid,
    #[error("Not witch")]
    NotWitch,
    #[error("Potion already used")]
    PotionUsed,
}

const MIN_PLAYERS: usize = 2;

#[derive(Clone, Debug)]
struct Player {
    address: Address,
    role: Role,
    alive: bool,
}

#[derive(Clone, Debug)]
struct Game {
    phase: Phase,
    round: u64,
    voting_open: bool,
    players: Vec<Player>,
    lovers: Option<(Address, Address)>,

    // Night
    protected: Option<Address>,
    attacked: Option<Address>,
    poisoned: Option<Address>,
    save_used: bool,
    poison_used: bool,
    hunter_shot: bool,

    // Day
    votes: HashMap<Address, Address>,
}

impl Game {
    fn new(players: Vec<Address>) -> Result<Self, Revert> {
        if players.len() < MIN_PLAYERS {
            return Err(Revert::NotEnoughPlayers);
        }
        let mut seen = HashSet::new();
        if !players.iter().all(|address| seen.insert(address)) {
            return Err(Revert::DuplicatePlayer);
        }
        let players = players
            .into_iter()
            .enumerate()
            .map(|(seat, address)| Player {
                address,
                role: Role::for_seat(seat),
                alive: true,
            })
            .collect();
        Ok(Self {
            phase: Phase::Night,
            round: 1,
            voting_open: false,
            players,
            lovers: None,
            protected: None,
            attacked: None,
            poisoned: None,
            save_used: false,
            poison_used: false,
            hunter_shot: false,
            votes: HashMap::new(),
        })
    }

    fn player(&self, address: &Address) -> Result<&Player, Revert> {
        self.players
            .iter()
            .find(|player| &player.address == address)
            .ok_or(Revert::NotAPlayer)
    }

    /// Living player acting as `address`.
    fn actor(&self, address: &Address) -> Result<Role, Revert> {
        let player = self.player(address)?;
        if !player.alive {
            return Err(Revert::PlayerDead);
        }
        Ok(player.role)
    }

    fn target(&self, address: &Address) -> Result<(), Revert> {
        if !self.player(address)?.alive {
            return Err(Revert::TargetDead);
        }
        Ok(())
    }

    fn require(&self, phase: Phase) -> Result<(), Revert> {
        if self.phase != phase {
            return Err(Revert::WrongPhase);
        }
        Ok(())
    }

    /// Kill `address` and, if it is one of the lovers, its partner.
    fn kill(&mut self, address: &Address) {
        let mut victims = vec![address.clone()];
        if let Some((first, second)) = &self.lovers {
            if first == address {
                victims.push(second.clone());
            } else if second == address {
                victims.push(first.clone());
            }
        }
        for player in &mut self.players {
            if victims.contains(&player.address) {
                player.alive = false;
            }
        }
    }

    fn night_action(&mut self, sender: &Address, target: &Address) -> Result<(), Revert> {
        self.require(Phase::Night)?;
        let role = self.actor(sender)?;
        self.target(target)?;
        match role {
            Role::Guard => self.protected = Some(target.clone()),
            Role::Werewolf => {
                if self.protected.as_ref() == Some(target) {
                    return Err(Revert::TargetProtected);
                }
                self.attacked = Some(target.clone());
            }
            // Peeking leaves no trace on the ledger
            Role::Seer => {}
            _ => return Err(Revert::NoNightAction),
        }
        Ok(())
    }

    fn cupid_action(
        &mut self,
        sender: &Address,
        lover1: &Address,
        lover2: &Address,
    ) -> Result<(), Revert> {
        self.require(Phase::Night)?;
        if self.actor(sender)? != Role::Cupid {
            return Err(Revert::NotCupid);
        }
        // Lovers are chosen once, on the first night
        if self.round != 1 || self.lovers.is_some() {
            return Err(Revert::WrongPhase);
        }
        self.target(lover1)?;
        self.target(lover2)?;
        if lover1 == lover2 {
            return Err(Revert::DuplicatePlayer);
        }
        self.lovers = Some((lover1.clone(), lover2.clone()));
        Ok(())
    }

    fn witch_action(
        &mut self,
        sender: &Address,
        target: &Address,
        save: bool,
        poison: bool,
    ) -> Result<(), Revert> {
        self.require(Phase::Night)?;
        if self.actor(sender)? != Role::Witch {
            return Err(Revert::NotWitch);
        }
        self.target(target)?;
        if (save && self.save_used) || (poison && self.poison_used) {
            return Err(Revert::PotionUsed);
        }
        if save {
            self.save_used = true;
            if self.attacked.as_ref() == Some(target) {
                self.attacked = None;
            }
        }
        if poison {
            self.poison_used = true;
            self.poisoned = Some(target.clone());
        }
        Ok(())
    }

    fn hunter_action(&mut self, sender: &Address, target: &Address) -> Result<(), Revert> {
        if self.phase == Phase::Lobby || self.phase == Phase::Ended {
            return Err(Revert::WrongPhase);
        }
        let hunter = self.player(sender)?;
        if hunter.role != Role::Hunter || hunter.alive || self.hunter_shot {
            return Err(Revert::HunterCannotShoot);
        }
        self.target(target)?;
        self.hunter_shot = true;
        self.kill(target);
        Ok(())
    }

    fn vote(&mut self, sender: &Address, target: &Address) -> Result<(), Revert> {
        self.require(Phase::Day)?;
        if !self.voting_open {
            return Err(Revert::VotingClosed);
        }
        self.actor(sender)?;
        self.target(target)?;
        self.votes.insert(sender.clone(), target.clone());
        Ok(())
    }

    fn pass_night(&mut self) -> Result<(), Revert> {
        self.require(Phase::Night)?;
        let attacked = self.attacked.take();
        let protected = self.protected.take();
        if let Some(victim) = attacked.filter(|victim| protected.as_ref() != Some(victim)) {
            self.kill(&victim);
        }
        if let Some(victim) = self.poisoned.take() {
            self.kill(&victim);
        }
        self.phase = Phase::Day;
        self.voting_open = true;
        self.votes.clear();
        Ok(())
    }

    fn end_voting(&mut self) -> Result<(), Revert> {
        self.require(Phase::Day)?;
        if !self.voting_open {
            return Err(Revert::VotingClosed);
        }
        self.voting_open = false;

        let eliminated = {
            let mut tally: HashMap<&Address, usize> = HashMap::new();
            for target in self.votes.values() {
                *tally.entry(target).or_default() += 1;
            }
            let top = tally.values().copied().max().unwrap_or(0);
            let mut leaders = tally
                .iter()
                .filter(|(_, count)| **count == top)
                .map(|(address, _)| (*address).clone());
            match (leaders.next(), leaders.next()) {
                (Some(leader), None) => Some(leader),
                _ => None,
            }
        };
        self.votes.clear();
        if let Some(eliminated) = eliminated {
            self.kill(&eliminated);
        }
        Ok(())
    }

    fn pass_day(&mut self) -> Result<(), Revert> {
        self.require(Phase::Day)?;
        self.phase = Phase::Night;
        self.round += 1;
        self.voting_open = false;
        self.votes.clear();
        Ok(())
    }

    fn apply(&mut self, sender: &Address, action: Action) -> Result<(), Revert> {
        match action {
            Action::StartGame { .. } => Err(Revert::GameExists),
            Action::Vote { target } => self.vote(sender, &target),
            Action::NightAction { target } => self.night_action(sender, &target),
            Action::CupidAction { lover1, lover2 } => self.cupid_action(sender, &lover1, &lover2),
            Action::WitchAction {
                target,
                save,
                poison,
            } => self.witch_action(sender, &target, save, poison),
            Action::HunterAction { target } => self.hunter_action(sender, &target),
            Action::PassNight => self.pass_night(),
            Action::PassDay => self.pass_day(),
            Action::EndVoting => self.end_voting(),
        }
    }

    fn view(&self, game_id: GameId) -> GameView {
        GameView {
            game_id,
            phase: self.phase,
            round: self.round,
            voting_open: self.voting_open,
            players: self
                .players
                .iter()
                .map(|player| PlayerView {
                    address: player.address.clone(),
                    role: player.role,
                    alive: player.alive,
                })
                .collect(),
        }
    }
}

/// All games hosted by one contract address.
#[derive(Default)]
pub struct Contract {
    games: HashMap<GameId, Game>,
}

impl Contract {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `action` sent by `sender` to `game_id`. Reverted actions leave
    /// the game untouched.
    pub fn execute(
        &mut self,
        sender: &Address,
        game_id: GameId,
        action: Action,
    ) -> Result<(), Revert> {
        match action {
            Action::StartGame { players } => {
                if self.games.contains_key(&game_id) {
                    return Err(Revert::GameExists);
                }
                self.games.insert(game_id, Game::new(players)?);
            }
            action => {
                let mut game = self
                    .games
                    .get(&game_id)
                    .ok_or(Revert::GameNotFound)?
                    .clone();
                game.apply(sender, action)?;
                self.games.insert(game_id, game);
            }
        }
        Ok(())
    }

    pub fn get_game(&self, game_id: GameId) -> Result<GameView, Revert> {
        self.games
            .get(&game_id)
            .map(|game| game.view(game_id))
            .ok_or(Revert::GameNotFound)
    }
}
