//! CrewActor integration tests
//!
//! Drives real actors with fast tick intervals and publishes risk levels
//! straight into the shared exchange.

use std::time::Duration;

use ractor::{Actor, ActorRef};
use shared_types::{CrewStatus, CrewStatusResponse, RunPhase};

use mission::actors::crew::{
    CrewActor, CrewArguments, CrewError, CrewMsg, CrewProfile, CrewSettings, RUN_HISTORY_LIMIT,
};
use mission::actors::risk_channel::RiskExchange;

fn calm(mut profile: CrewProfile) -> CrewProfile {
    profile.mishap_chance = 0.0;
    profile
}

async fn spawn_crew(
    profile: CrewProfile,
    turn_tick: Duration,
    exchange: &RiskExchange,
) -> ActorRef<CrewMsg> {
    let (actor, _handle) = Actor::spawn(
        None,
        CrewActor,
        CrewArguments {
            profile,
            settings: CrewSettings {
                turn_tick,
                num_parties: 4,
            },
            risk_exchange: exchange.clone(),
        },
    )
    .await
    .expect("Failed to spawn CrewActor");
    actor
}

async fn begin_distraction(actor: &ActorRef<CrewMsg>, turns: u32) -> Result<String, CrewError> {
    ractor::call!(actor, |reply| CrewMsg::BeginDistraction {
        run_id: None,
        required_turns: turns,
        reply,
    })
    .expect("RPC failed")
}

async fn begin_heist(
    actor: &ActorRef<CrewMsg>,
    turns: u32,
    base_loot: i64,
) -> Result<String, CrewError> {
    ractor::call!(actor, |reply| CrewMsg::BeginHeist {
        run_id: None,
        required_turns: turns,
        risk_factor: 50,
        base_loot,
        reply,
    })
    .expect("RPC failed")
}

async fn status(actor: &ActorRef<CrewMsg>) -> CrewStatusResponse {
    ractor::call!(actor, |reply| CrewMsg::GetStatus { reply }).expect("RPC failed")
}

async fn wait_terminal(actor: &ActorRef<CrewMsg>, run_id: &str) -> CrewStatusResponse {
    let mut receiver = ractor::call!(actor, |reply| CrewMsg::Subscribe {
        run_id: run_id.to_string(),
        reply,
    })
    .expect("RPC failed")
    .expect("Unknown run");

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = receiver.borrow_and_update().clone();
            if snapshot.is_terminal() {
                return snapshot;
            }
            receiver.changed().await.expect("Run notifier dropped");
        }
    })
    .await
    .expect("Run did not finish in time")
}

async fn wait_for(actor: &ActorRef<CrewMsg>, predicate: impl Fn(&CrewStatusResponse) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if predicate(&status(actor).await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("Condition not reached in time");
}

#[tokio::test]
async fn test_status_is_waiting_before_any_run() {
    let exchange = RiskExchange::new();
    let actor = spawn_crew(CrewProfile::franklin(), Duration::from_millis(5), &exchange).await;

    let snapshot = status(&actor).await;
    assert_eq!(snapshot.status, CrewStatus::Waiting);
    assert_eq!(snapshot.character, "Franklin");
    assert!(snapshot.run_id.is_none());

    actor.stop(None);
}

#[tokio::test]
async fn test_distraction_completes_all_turns() {
    let exchange = RiskExchange::new();
    let actor = spawn_crew(calm(CrewProfile::trevor()), Duration::from_millis(1), &exchange).await;

    let run_id = begin_distraction(&actor, 20).await.unwrap();
    let finished = wait_terminal(&actor, &run_id).await;

    assert_eq!(finished.status, CrewStatus::Success);
    assert_eq!(finished.phase, Some(RunPhase::Distraction));
    assert_eq!(finished.turns_completed, 20);
    assert_eq!(finished.total_turns, 20);
    assert_eq!(finished.final_loot, 0);

    actor.stop(None);
}

#[tokio::test]
async fn test_distraction_mishap_fails_at_halfway() {
    let exchange = RiskExchange::new();
    let mut profile = CrewProfile::franklin();
    profile.mishap_chance = 1.0;
    let actor = spawn_crew(profile, Duration::from_millis(1), &exchange).await;

    let run_id = begin_distraction(&actor, 10).await.unwrap();
    let finished = wait_terminal(&actor, &run_id).await;

    assert_eq!(finished.status, CrewStatus::Failed);
    assert_eq!(finished.turns_completed, 5);
    assert_eq!(
        finished.failure_reason.as_deref(),
        Some("Chop barked and blew the cover")
    );

    actor.stop(None);
}

#[tokio::test]
async fn test_second_begin_while_pending_is_rejected() {
    let exchange = RiskExchange::new();
    let actor =
        spawn_crew(calm(CrewProfile::franklin()), Duration::from_millis(50), &exchange).await;

    let run_id = begin_distraction(&actor, 10_000).await.unwrap();
    let second = begin_heist(&actor, 10, 1_000).await;
    assert_eq!(second, Err(CrewError::AlreadyBusy(run_id.clone())));

    let aborted = ractor::call!(actor, |reply| CrewMsg::Abort {
        run_id: run_id.clone(),
        reason: "called off".to_string(),
        reply,
    })
    .unwrap();
    assert!(aborted);

    let finished = status(&actor).await;
    assert_eq!(finished.status, CrewStatus::Failed);
    assert_eq!(finished.failure_reason.as_deref(), Some("called off"));

    // Aborting twice is a no-op and a new run may start.
    let again = ractor::call!(actor, |reply| CrewMsg::Abort {
        run_id: run_id.clone(),
        reason: "again".to_string(),
        reply,
    })
    .unwrap();
    assert!(!again);
    assert!(begin_distraction(&actor, 5).await.is_ok());

    actor.stop(None);
}

#[tokio::test]
async fn test_zero_turns_is_invalid() {
    let exchange = RiskExchange::new();
    let actor = spawn_crew(CrewProfile::franklin(), Duration::from_millis(5), &exchange).await;

    assert!(matches!(
        begin_distraction(&actor, 0).await,
        Err(CrewError::InvalidRequest(_))
    ));

    actor.stop(None);
}

#[tokio::test]
async fn test_heist_fails_when_ceiling_reached() {
    let exchange = RiskExchange::new();
    let actor = spawn_crew(calm(CrewProfile::trevor()), Duration::from_millis(20), &exchange).await;

    let run_id = begin_heist(&actor, 100_000, 80_000).await.unwrap();
    for level in [1, 2, 3] {
        exchange.publish("Trevor", level).await.unwrap();
    }
    wait_for(&actor, |s| s.risk_level == 3).await;
    assert_eq!(status(&actor).await.status, CrewStatus::Working);

    exchange.publish("Trevor", 4).await.unwrap();
    exchange.publish("Trevor", 7).await.unwrap();
    let finished = wait_terminal(&actor, &run_id).await;

    assert_eq!(finished.status, CrewStatus::Failed);
    assert_eq!(finished.risk_level, 7);
    assert!(finished.ability_active);
    assert_eq!(
        finished.failure_reason.as_deref(),
        Some("Too many wanted stars (7/7)")
    );

    // Frozen after the terminal transition and the channel is released.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(status(&actor).await.turns_completed, finished.turns_completed);
    assert!(!exchange.has_consumer("Trevor").await);

    actor.stop(None);
}

#[tokio::test]
async fn test_franklin_fails_at_five_stars() {
    let exchange = RiskExchange::new();
    let actor =
        spawn_crew(calm(CrewProfile::franklin()), Duration::from_millis(20), &exchange).await;

    let run_id = begin_heist(&actor, 100_000, 50_000).await.unwrap();
    for level in [1, 2, 3, 5] {
        exchange.publish("Franklin", level).await.unwrap();
    }
    let finished = wait_terminal(&actor, &run_id).await;

    assert_eq!(finished.status, CrewStatus::Failed);
    assert_eq!(finished.risk_level, 5);
    assert_eq!(
        finished.failure_reason.as_deref(),
        Some("Too many wanted stars (5/5)")
    );
}

#[tokio::test]
async fn test_heist_bonus_accrues_after_ability() {
    let exchange = RiskExchange::new();
    let actor =
        spawn_crew(calm(CrewProfile::franklin()), Duration::from_millis(2), &exchange).await;

    let run_id = begin_heist(&actor, 60, 50_000).await.unwrap();
    exchange.publish("Franklin", 3).await.unwrap();
    let finished = wait_terminal(&actor, &run_id).await;

    assert_eq!(finished.status, CrewStatus::Success);
    assert!(finished.ability_active);
    assert!(finished.bonus_loot > 0);
    assert_eq!(finished.bonus_loot % 1000, 0);
    assert_eq!(finished.final_loot, 50_000 + finished.bonus_loot);

    let loot = ractor::call!(actor, |reply| CrewMsg::GetFinalLoot { reply })
        .unwrap()
        .unwrap();
    assert_eq!(loot, finished.final_loot);

    let share = finished.final_loot / 4;
    let wrong = ractor::call!(actor, |reply| CrewMsg::Settle {
        amount: share + 1,
        reply,
    })
    .unwrap();
    assert_eq!(
        wrong,
        Err(CrewError::AmountMismatch {
            expected: share,
            received: share + 1,
        })
    );

    let paid = ractor::call!(actor, |reply| CrewMsg::Settle {
        amount: share,
        reply,
    })
    .unwrap();
    assert_eq!(paid, Ok(CrewProfile::franklin().payment_ack));

    actor.stop(None);
}

#[tokio::test]
async fn test_closed_risk_channel_fails_heist() {
    let exchange = RiskExchange::new();
    let actor =
        spawn_crew(calm(CrewProfile::franklin()), Duration::from_millis(20), &exchange).await;

    let run_id = begin_heist(&actor, 100_000, 10_000).await.unwrap();
    assert!(exchange.close("Franklin").await);

    let finished = wait_terminal(&actor, &run_id).await;
    assert_eq!(finished.status, CrewStatus::Failed);
    assert_eq!(
        finished.failure_reason.as_deref(),
        Some("Risk channel closed during the heist")
    );

    actor.stop(None);
}

#[tokio::test]
async fn test_settle_and_loot_require_success() {
    let exchange = RiskExchange::new();
    let actor = spawn_crew(calm(CrewProfile::trevor()), Duration::from_millis(1), &exchange).await;

    let early = ractor::call!(actor, |reply| CrewMsg::Settle { amount: 10, reply }).unwrap();
    assert!(matches!(early, Err(CrewError::NotReady(_))));

    let run_id = begin_distraction(&actor, 4).await.unwrap();
    wait_terminal(&actor, &run_id).await;

    // Distraction-only success: any payment is welcome, but there is no loot.
    let paid = ractor::call!(actor, |reply| CrewMsg::Settle {
        amount: 12_345,
        reply,
    })
    .unwrap();
    assert_eq!(paid, Ok(CrewProfile::trevor().payment_ack));

    let loot = ractor::call!(actor, |reply| CrewMsg::GetFinalLoot { reply }).unwrap();
    assert!(matches!(loot, Err(CrewError::NotReady(_))));

    actor.stop(None);
}

#[tokio::test]
async fn test_explicit_run_id_cannot_be_reused() {
    let exchange = RiskExchange::new();
    let actor = spawn_crew(calm(CrewProfile::trevor()), Duration::from_millis(1), &exchange).await;

    let first = ractor::call!(actor, |reply| CrewMsg::BeginDistraction {
        run_id: Some("mission-1".to_string()),
        required_turns: 2,
        reply,
    })
    .unwrap()
    .unwrap();
    assert_eq!(first, "mission-1");
    wait_terminal(&actor, &first).await;

    let again = ractor::call!(actor, |reply| CrewMsg::BeginDistraction {
        run_id: Some("mission-1".to_string()),
        required_turns: 2,
        reply,
    })
    .unwrap();
    assert_eq!(again, Err(CrewError::DuplicateRun("mission-1".to_string())));

    actor.stop(None);
}

#[tokio::test]
async fn test_previous_runs_stay_queryable() {
    let exchange = RiskExchange::new();
    let actor = spawn_crew(calm(CrewProfile::trevor()), Duration::from_millis(1), &exchange).await;

    let first = begin_distraction(&actor, 3).await.unwrap();
    wait_terminal(&actor, &first).await;
    let second = begin_distraction(&actor, 10_000).await.unwrap();

    let earlier = ractor::call!(actor, |reply| CrewMsg::GetRunStatus {
        run_id: first.clone(),
        reply,
    })
    .unwrap()
    .expect("First run forgotten");
    assert_eq!(earlier.status, CrewStatus::Success);
    assert_eq!(earlier.turns_completed, 3);

    let latest = status(&actor).await;
    assert_eq!(latest.run_id.as_deref(), Some(second.as_str()));
    assert_eq!(latest.status, CrewStatus::Working);

    let unknown = ractor::call!(actor, |reply| CrewMsg::GetRunStatus {
        run_id: "never-started".to_string(),
        reply,
    })
    .unwrap();
    assert!(unknown.is_none());

    actor.stop(None);
}

#[tokio::test]
async fn test_status_stays_consistent_while_ticking() {
    let exchange = RiskExchange::new();
    let actor =
        spawn_crew(calm(CrewProfile::franklin()), Duration::from_millis(1), &exchange).await;

    let run_id = begin_heist(&actor, 200, 50_000).await.unwrap();
    exchange.publish("Franklin", 3).await.unwrap();

    let mut last_turns = 0;
    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = status(&actor).await;
            assert_eq!(snapshot.run_id.as_deref(), Some(run_id.as_str()));
            assert!(snapshot.turns_completed >= last_turns);
            assert!(snapshot.turns_completed <= snapshot.total_turns);
            assert_eq!(snapshot.final_loot, 50_000 + snapshot.bonus_loot);
            if snapshot.status == CrewStatus::Success {
                assert_eq!(snapshot.turns_completed, snapshot.total_turns);
            }
            last_turns = snapshot.turns_completed;
            if snapshot.is_terminal() {
                return snapshot;
            }
        }
    })
    .await
    .expect("Run did not finish in time");

    assert_eq!(finished.status, CrewStatus::Success);
    assert_eq!(finished.total_turns, 200);
    assert!(finished.bonus_loot > 0);

    actor.stop(None);
}

#[tokio::test]
async fn test_oldest_runs_are_forgotten() {
    let exchange = RiskExchange::new();
    let actor =
        spawn_crew(calm(CrewProfile::trevor()), Duration::from_millis(1), &exchange).await;

    let mut run_ids = Vec::new();
    for _ in 0..=RUN_HISTORY_LIMIT {
        let run_id = begin_distraction(&actor, 1).await.unwrap();
        wait_terminal(&actor, &run_id).await;
        run_ids.push(run_id);
    }

    let oldest = ractor::call!(actor, |reply| CrewMsg::GetRunStatus {
        run_id: run_ids[0].clone(),
        reply,
    })
    .unwrap();
    assert!(oldest.is_none());

    let kept = ractor::call!(actor, |reply| CrewMsg::GetRunStatus {
        run_id: run_ids[1].clone(),
        reply,
    })
    .unwrap()
    .expect("Recent run forgotten");
    assert_eq!(kept.status, CrewStatus::Success);

    let latest = status(&actor).await;
    assert_eq!(latest.run_id.as_ref(), run_ids.last());

    actor.stop(None);
}
