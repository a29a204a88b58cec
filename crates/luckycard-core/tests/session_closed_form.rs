use luckycard_core::game::{
    Game, GamePhase, NoiseSchedule, PlayMode, ScriptedResponder, SessionConfig, UpdateRule,
};
use luckycard_core::model::player::Player;
use luckycard_core::model::trial::Trial;
use luckycard_core::response::SoftmaxModel;

const PATTERN: [(u32, i64); 8] = [
    (2, 1),
    (4, -1),
    (0, 1),
    (5, -1),
    (3, 1),
    (1, -1),
    (2, -1),
    (4, 1),
];

fn trials() -> Vec<Trial> {
    PATTERN
        .iter()
        .map(|&(n_red, outcome)| Trial::from_raw(5, n_red, outcome).expect("valid trial"))
        .collect()
}

fn config(seed: u64) -> SessionConfig {
    SessionConfig {
        seed,
        n_sessions: 3,
        ..SessionConfig::default()
    }
}

#[test]
fn replicated_sessions_follow_additive_closed_form() {
    let (alpha, bias, s0) = (0.35, 0.02, 0.1);
    let player = Player::new(alpha).with_bias(bias).with_prior(s0);
    let mut game = Game::new(trials(), player, config(20251018)).expect("game");
    let log = game.play().expect("play").to_vec();

    assert_eq!(log.len(), PATTERN.len() * 3);
    assert_eq!(game.phase(), GamePhase::Terminal);

    let violations: f64 = log.iter().map(|row| row.exp_violation).sum();
    let expected = s0 + alpha * violations + log.len() as f64 * bias;
    assert!((game.player().suspicion() - expected).abs() < 1e-9);

    // Suspicion carries across session boundaries.
    let boundary = PATTERN.len();
    assert_eq!(log[boundary].session, 2);
    assert_eq!(log[boundary].suspicion_before, log[boundary - 1].suspicion_after);
}

#[test]
fn choice_probabilities_match_comparison_sets() {
    let player = Player::new(0.5).with_beta(2.0);
    let mut game = Game::new(trials(), player, config(7)).expect("game");
    game.play().expect("play");

    let softmax = SoftmaxModel::new(2.0);
    for n_red in game.history().configurations().collect::<Vec<_>>() {
        let set = game.history().comparison_set(n_red);
        let total: f64 = softmax.distribution(set).iter().sum();
        assert!((total - 1.0).abs() < 1e-9, "n_red {n_red} sums to {total}");
    }

    for row in game.log() {
        assert!(row.choice_probability > 0.0 && row.choice_probability <= 1.0);
    }
    let first_seen = game
        .log()
        .iter()
        .find(|row| row.n_red == 0)
        .expect("n_red 0 appears");
    assert_eq!(first_seen.choice_probability, 1.0);
}

#[test]
fn per_run_noise_is_constant_within_a_game() {
    let cfg = SessionConfig {
        noise: NoiseSchedule::PerRun { scale: 0.2 },
        ..config(99)
    };
    let mut game = Game::new(trials(), Player::new(0.5), cfg).expect("game");
    let log = game.play().expect("play");

    let first = log[0].noise;
    assert!(first.abs() <= 0.2);
    assert!(log.iter().all(|row| row.noise == first));
}

#[test]
fn identical_seeds_replay_identically() {
    let cfg = SessionConfig {
        shuffle: true,
        noise: NoiseSchedule::PerTrial { scale: 0.1 },
        mode: PlayMode::Play,
        rule: UpdateRule::Unsigned,
        ..config(42)
    };
    let run = |cfg: SessionConfig| {
        let mut game = Game::new(trials(), Player::new(0.4), cfg).expect("game");
        game.play().expect("play").to_vec()
    };
    assert_eq!(run(cfg), run(cfg));
}

#[test]
fn scripted_ratings_land_in_the_log() {
    let mut responder = ScriptedResponder::new(vec![3.0, 4.0, 5.0]).with_latencies(vec![810.0]);
    let mut game = Game::new(trials(), Player::new(0.5), SessionConfig::default()).expect("game");
    let log = game.play_with(&mut responder).expect("play");

    assert_eq!(log[0].rating, Some(3.0));
    assert_eq!(log[0].response_latency_ms, Some(810.0));
    assert_eq!(log[2].rating, Some(5.0));
    assert_eq!(log[2].response_latency_ms, None);
    assert_eq!(log[3].rating, None);
    assert_eq!(responder.remaining(), 0);
}

#[test]
fn invalid_outcome_is_rejected_before_play() {
    let mut trials = trials();
    trials.push(Trial::from_raw(5, 1, 0).expect("construction defers outcome check"));
    assert!(Game::new(trials, Player::new(0.5), SessionConfig::default()).is_err());
}
