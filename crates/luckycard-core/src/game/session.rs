use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

use crate::error::ModelError;
use crate::game::history::SuspicionHistory;
use crate::game::record::TrialRecord;
use crate::game::responder::{Prompt, Responder, SilentResponder};
use crate::game::update::{NoiseSchedule, NoiseState, UpdateRule};
use crate::model::colour::Colour;
use crate::model::player::Player;
use crate::model::reward::{RewardPolicy, RoundScore};
use crate::model::trial::Trial;
use crate::response::SoftmaxModel;

pub const DEFAULT_SEED: u64 = 42;

/// Whether the player only observes reports or also plays a card each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    #[default]
    Observe,
    Play,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default = "default_sessions")]
    pub n_sessions: usize,
    #[serde(default)]
    pub rule: UpdateRule,
    #[serde(default)]
    pub noise: NoiseSchedule,
    #[serde(default)]
    pub reward_policy: RewardPolicy,
    #[serde(default)]
    pub mode: PlayMode,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_sessions() -> usize {
    1
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            shuffle: false,
            n_sessions: 1,
            rule: UpdateRule::default(),
            noise: NoiseSchedule::default(),
            reward_policy: RewardPolicy::default(),
            mode: PlayMode::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.n_sessions == 0 {
            return Err(ModelError::InvalidField {
                field: "session.n_sessions".to_string(),
                message: "at least one session is required".to_string(),
            });
        }
        self.noise.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Init,
    Running,
    Terminal,
}

/// Drives an ordered trial list through one player, logging every round.
#[derive(Debug, Clone)]
pub struct Game {
    trials: Vec<Trial>,
    base_len: usize,
    player: Player,
    config: SessionConfig,
    softmax: SoftmaxModel,
    rng: StdRng,
    history: SuspicionHistory,
    log: Vec<TrialRecord>,
    phase: GamePhase,
    total_reward: i32,
}

impl Game {
    pub fn new(trials: Vec<Trial>, player: Player, config: SessionConfig) -> Result<Self, ModelError> {
        config.validate()?;
        for trial in &trials {
            trial.expectation()?;
        }

        Ok(Self {
            base_len: trials.len(),
            trials,
            softmax: SoftmaxModel::new(player.beta()),
            history: SuspicionHistory::new(player.suspicion()),
            player,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            log: Vec::new(),
            phase: GamePhase::Init,
            total_reward: 0,
        })
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    /// Trials in play order; after `play` this is the shuffled, replicated schedule.
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn history(&self) -> &SuspicionHistory {
        &self.history
    }

    pub fn log(&self) -> &[TrialRecord] {
        &self.log
    }

    pub fn total_reward(&self) -> i32 {
        self.total_reward
    }

    pub fn delta_suspicion(&self) -> Vec<f64> {
        self.history.deltas()
    }

    pub fn play(&mut self) -> Result<&[TrialRecord], ModelError> {
        self.play_with(&mut SilentResponder)
    }

    /// Run every trial once. A terminal game is left untouched.
    pub fn play_with(&mut self, responder: &mut dyn Responder) -> Result<&[TrialRecord], ModelError> {
        if self.phase == GamePhase::Terminal {
            return Ok(&self.log);
        }
        self.phase = GamePhase::Running;

        if self.config.shuffle {
            self.trials.shuffle(&mut self.rng);
        }
        if self.config.n_sessions > 1 {
            let base = self.trials.clone();
            for _ in 1..self.config.n_sessions {
                self.trials.extend(base.iter().cloned());
            }
        }

        let mut noise = self.config.noise.start(&mut self.rng);
        for index in 0..self.trials.len() {
            self.play_trial(index, &mut noise, responder)?;
        }

        self.phase = GamePhase::Terminal;
        event!(
            target: "luckycard::session",
            Level::DEBUG,
            trials = self.log.len(),
            final_suspicion = self.player.suspicion(),
            total_reward = self.total_reward,
            seed = self.config.seed,
        );
        Ok(&self.log)
    }

    fn play_trial(
        &mut self,
        index: usize,
        noise: &mut NoiseState,
        responder: &mut dyn Responder,
    ) -> Result<(), ModelError> {
        let trial = self.trials[index].clone();
        let opponent = trial.outcome()?;
        let expectation = trial.expectation()?;
        let violation = self.config.rule.violation(&trial)?;
        let before = self.player.suspicion();

        let play = match self.config.mode {
            PlayMode::Observe => None,
            PlayMode::Play => Some(self.play_card(&trial, opponent, violation, before)),
        };

        let noise_value = noise.next(&mut self.rng);
        let after = self.config.rule.apply(
            before,
            self.player.alpha(),
            self.player.bias(),
            violation,
            noise_value,
        );
        self.player.update_suspicion(after);
        let comparison = self.history.record(trial.n_red(), after);
        let choice_probability = self.softmax.probability(after, comparison);

        let response = responder.respond(&Prompt {
            trial: index + 1,
            n_red: trial.n_red(),
            opponent,
            selected_card: play.as_ref().map(|p| p.selected),
            suspicion: after,
        });

        let slot = &mut self.trials[index];
        slot.attach_violation(violation);
        if let Some(p) = play.as_ref() {
            slot.attach_reward(p.score.player);
            self.total_reward += i32::from(p.score.player);
        }

        let record = TrialRecord {
            trial: index + 1,
            session: index / self.base_len.max(1) + 1,
            n_red: trial.n_red(),
            n_blue: trial.n_blue(),
            outcome: opponent,
            expectation,
            exp_violation: violation,
            suspicion_before: before,
            suspicion_after: after,
            delta: after - before,
            noise: noise_value,
            choice_probability,
            selected_card: play.as_ref().map(|p| p.selected),
            reported_card: play.as_ref().map(|p| p.reported),
            lied: play.as_ref().map(|p| p.lied),
            player_reward: play.as_ref().map(|p| p.score.player),
            opponent_reward: play.as_ref().map(|p| p.score.opponent),
            result: play.as_ref().map(|p| p.score.result),
            rating: response.rating,
            response_latency_ms: response.latency_ms,
        };

        event!(
            target: "luckycard::trial",
            Level::INFO,
            trial = record.trial,
            n_red = record.n_red,
            outcome = opponent.value(),
            violation,
            suspicion = after,
            delta = record.delta,
            choice_probability,
        );

        self.log.push(record);
        Ok(())
    }

    /// Deal the player's card and apply the lie rule: lie when the weighted surprise
    /// exceeds the bias plus the suspicion carried into the round.
    fn play_card(&mut self, trial: &Trial, opponent: Colour, violation: f64, before: f64) -> CardPlay {
        let selected = trial.selected_card(&mut self.rng);
        let lied = self.player.alpha() * violation > self.player.bias() + before;
        let reported = if lied { selected.opposite() } else { selected };
        CardPlay {
            selected,
            reported,
            lied,
            score: self.config.reward_policy.score(opponent, reported),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CardPlay {
    selected: Colour,
    reported: Colour,
    lied: bool,
    score: RoundScore,
}
