//! Integration tests over the public API: the configure/update/trigger/execute
//! lifecycle, keeper batch semantics, and concurrency at the rate gate.

use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use trailstop_core::*;

const OWNER: ActorId = ActorId(1);
const KEEPER: ActorId = ActorId(2);
const MAKER: ActorId = ActorId(10);
const CUSTODIAN: ActorId = ActorId(99);

struct World {
    oracle: Arc<MockOracle>,
    venue: Arc<MockVenue>,
    ledger: Arc<AssetLedger>,
    events: Arc<EventCollector>,
    registry: Arc<TrailingStopRegistry>,
    engine: Arc<TrailingStopEngine>,
    gateway: ExecutionGateway,
    scheduler: AutomationScheduler,
    admin: AdminGate,
}

fn world(policy: RatchetPolicy) -> World {
    let oracle = Arc::new(MockOracle::new());
    let venue = Arc::new(MockVenue::new("test-venue", VenueMode::Quote(dec!(0))));
    let ledger = Arc::new(AssetLedger::new());
    let events = Arc::new(EventCollector::new());
    let registry = Arc::new(TrailingStopRegistry::new());
    let pause = Arc::new(PauseSwitch::new());

    let engine = Arc::new(TrailingStopEngine::new(
        EngineConfig::default().with_policy(policy),
        Arc::clone(&registry),
        Arc::clone(&oracle) as Arc<dyn PriceOracle>,
        Arc::clone(&pause),
        Arc::clone(&events) as Arc<dyn EventSink>,
    ));
    let gateway = ExecutionGateway::new(
        Arc::clone(&ledger),
        Arc::clone(&venue) as Arc<dyn SwapVenue>,
        CUSTODIAN,
        Arc::clone(&pause),
        Arc::clone(&events) as Arc<dyn EventSink>,
    );
    let scheduler = AutomationScheduler::new(Arc::clone(&engine), KEEPER);
    let admin = AdminGate::new(
        OWNER,
        Arc::clone(&engine),
        pause,
        Arc::clone(&events) as Arc<dyn EventSink>,
    );

    World {
        oracle,
        venue,
        ledger,
        events,
        registry,
        engine,
        gateway,
        scheduler,
        admin,
    }
}

fn eth() -> OracleRef {
    OracleRef::new("ETH/USD")
}

fn weth() -> AssetId {
    AssetId::new("WETH")
}

fn usdc() -> AssetId {
    AssetId::new("USDC")
}

fn t(secs: i64) -> Timestamp {
    Timestamp::from_secs(secs)
}

fn execution_request(order_id: OrderId, amount: rust_decimal::Decimal, min_out: rust_decimal::Decimal) -> ExecutionRequest {
    ExecutionRequest {
        order_id,
        maker: MAKER,
        receiver: MAKER,
        maker_asset: weth(),
        taker_asset: usdc(),
        making_amount: amount,
        min_acceptable_output: min_out,
        payload: vec![],
    }
}

#[test]
fn configure_seeds_state_exactly() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);

    w.engine.configure(id, eth(), dec!(1000), 200, 3600, t(42)).unwrap();

    let state = w.engine.stop_state(id).unwrap();
    assert_eq!(state.current_stop_price, state.initial_stop_price);
    assert_eq!(state.current_stop_price.value(), dec!(1000));
    assert_eq!(state.last_update_at, state.configured_at);
    assert_eq!(state.configured_at, t(42));
    assert_eq!(state.update_frequency, 3600);
}

// full walk-through: configure at t=0, ratchet up at t=3601, retrace at t=7202
#[test]
fn end_to_end_scenario_monotonic() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);

    w.engine.configure(id, eth(), dec!(1000), 200, 3600, t(0)).unwrap();

    w.oracle.set_price(&eth(), 120_000_000_000, 8, t(3601));
    let up = w.engine.update(id, KEEPER, t(3601)).unwrap();
    assert_eq!(up.new_stop_price.value(), dec!(1176)); // 1200 - 24

    w.oracle.set_price(&eth(), 115_000_000_000, 8, t(7202));
    let retrace = w.engine.update(id, KEEPER, t(7202)).unwrap();
    // monotonic: the 1127 candidate is below the stop, so the stop holds
    assert_eq!(retrace.new_stop_price.value(), dec!(1176));
    assert_eq!(w.engine.stop_state(id).unwrap().last_update_at, t(7202));
}

#[test]
fn end_to_end_scenario_repeg() {
    let w = world(RatchetPolicy::AlwaysRepeg);
    let id = OrderId::from_low_u64(1);

    w.engine.configure(id, eth(), dec!(1000), 200, 3600, t(0)).unwrap();

    w.oracle.set_price(&eth(), 120_000_000_000, 8, t(3601));
    assert_eq!(
        w.engine.update(id, KEEPER, t(3601)).unwrap().new_stop_price.value(),
        dec!(1176)
    );

    w.oracle.set_price(&eth(), 115_000_000_000, 8, t(7202));
    // re-peg recomputes from 1150: 1150 - 23 = 1127
    assert_eq!(
        w.engine.update(id, KEEPER, t(7202)).unwrap().new_stop_price.value(),
        dec!(1127)
    );
}

#[test]
fn full_trigger_and_settlement_flow() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);

    w.engine.configure(id, eth(), dec!(1000), 200, 3600, t(0)).unwrap();
    w.oracle.set_price(&eth(), 98_000_000_000, 8, t(3601));
    // repeg down is suppressed but the stop from configure still stands at 1000
    w.engine.update(id, KEEPER, t(3601)).unwrap();

    w.ledger.credit(MAKER, &weth(), dec!(2)).unwrap();
    w.venue.set_mode(VenueMode::Quote(dec!(1948)));

    let snapshot = w
        .engine
        .validate_trigger(id, Price::new_unchecked(dec!(975)), t(3700))
        .unwrap();
    let receipt = w
        .gateway
        .execute(&snapshot, &execution_request(id, dec!(2), dec!(1940)), t(3700))
        .unwrap();

    assert_eq!(receipt.actual_output, dec!(1948));
    assert_eq!(w.ledger.balance_of(MAKER, &weth()), dec!(0));
    assert_eq!(w.ledger.balance_of(MAKER, &usdc()), dec!(1948));

    // the audit stream saw the whole lifecycle in order
    let kinds: Vec<&'static str> = w
        .events
        .events()
        .iter()
        .map(|event| match event.payload {
            EventPayload::StopConfigured(_) => "configured",
            EventPayload::StopUpdated(_) => "updated",
            EventPayload::TriggerValidated(_) => "validated",
            EventPayload::ExecutionSettled(_) => "settled",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, vec!["configured", "updated", "validated", "settled"]);
}

#[test]
fn trigger_threshold_boundaries() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);
    w.engine.configure(id, eth(), dec!(980), 200, 3600, t(0)).unwrap();

    assert!(matches!(
        w.engine.validate_trigger(id, Price::new_unchecked(dec!(985)), t(1)),
        Err(StopError::TriggerNotMet { .. })
    ));
    // at the stop exactly counts as reached
    assert!(w
        .engine
        .validate_trigger(id, Price::new_unchecked(dec!(980)), t(1))
        .is_ok());
    assert!(w
        .engine
        .validate_trigger(id, Price::new_unchecked(dec!(975)), t(1))
        .is_ok());
}

#[test]
fn execution_failure_leaves_maker_whole() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);
    w.engine.configure(id, eth(), dec!(980), 200, 3600, t(0)).unwrap();
    w.ledger.credit(MAKER, &weth(), dec!(2)).unwrap();

    let snapshot = w
        .engine
        .validate_trigger(id, Price::new_unchecked(dec!(975)), t(10))
        .unwrap();

    for mode in [
        VenueMode::Quote(dec!(1900)), // below the 1940 minimum
        VenueMode::Reject("no route".to_string()),
        VenueMode::Timeout,
    ] {
        w.venue.set_mode(mode);
        let result = w
            .gateway
            .execute(&snapshot, &execution_request(id, dec!(2), dec!(1940)), t(11));
        assert!(result.is_err());
        assert_eq!(w.ledger.balance_of(MAKER, &weth()), dec!(2));
        assert_eq!(w.ledger.balance_of(MAKER, &usdc()), dec!(0));
        assert_eq!(w.ledger.balance_of(CUSTODIAN, &weth()), dec!(0));
    }

    // every rollback produced an audit rejection
    let rejections = w
        .events
        .events()
        .iter()
        .filter(|event| matches!(event.payload, EventPayload::ExecutionRejected(_)))
        .count();
    assert_eq!(rejections, 3);
}

#[test]
fn cycle_isolates_failures_and_reports_each_order() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let a = OrderId::from_low_u64(1);
    let b = OrderId::from_low_u64(2);
    let btc = OracleRef::new("BTC/USD");

    w.engine.configure(a, eth(), dec!(1000), 200, 3600, t(0)).unwrap();
    w.engine.configure(b, btc.clone(), dec!(50000), 200, 3600, t(0)).unwrap();

    w.oracle.take_offline(&eth());
    w.oracle.set_price(&btc, 60_000_00000000, 8, t(3601));

    let outcomes = w.scheduler.run_cycle(&[a, b], t(3601));
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(
        outcomes[0].status,
        CycleStatus::Failed(StopError::OracleUnavailable(_))
    ));
    assert!(outcomes[1].is_success());
    assert_eq!(
        w.engine.stop_state(b).unwrap().current_stop_price.value(),
        dec!(58800)
    );
}

#[test]
fn pause_gates_update_and_execute_atomically() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);
    w.engine.configure(id, eth(), dec!(980), 200, 60, t(0)).unwrap();
    w.oracle.set_price(&eth(), 120_000_000_000, 8, t(61));
    w.ledger.credit(MAKER, &weth(), dec!(2)).unwrap();
    w.venue.set_mode(VenueMode::Quote(dec!(1948)));

    // validation is read-only and stays available while paused
    let snapshot = w
        .engine
        .validate_trigger(id, Price::new_unchecked(dec!(975)), t(61))
        .unwrap();

    w.admin.pause(OWNER, t(61)).unwrap();
    assert_eq!(w.engine.update(id, KEEPER, t(61)), Err(StopError::Paused));
    assert_eq!(
        w.gateway
            .execute(&snapshot, &execution_request(id, dec!(2), dec!(1940)), t(61)),
        Err(ExecutionError::Paused)
    );
    // no funds moved while paused
    assert_eq!(w.ledger.balance_of(MAKER, &weth()), dec!(2));

    w.admin.unpause(OWNER, t(62)).unwrap();
    assert!(w.engine.update(id, KEEPER, t(62)).is_ok());
    assert!(w
        .gateway
        .execute(&snapshot, &execution_request(id, dec!(2), dec!(1940)), t(62))
        .is_ok());
}

// two keepers racing one frequency window: the per-order critical section
// admits exactly one of them
#[test]
fn racing_updates_share_one_window() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);
    w.engine.configure(id, eth(), dec!(1000), 200, 3600, t(0)).unwrap();
    w.oracle.set_price(&eth(), 120_000_000_000, 8, t(3600));

    let engine = &w.engine;
    let results: Vec<Result<StopUpdate, StopError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4u64)
            .map(|keeper| {
                scope.spawn(move || engine.update(id, ActorId(100 + keeper), t(3600)))
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    for result in results.iter().filter(|result| result.is_err()) {
        assert!(matches!(
            result,
            Err(StopError::UpdateTooFrequent { .. })
        ));
    }
    assert_eq!(
        w.engine.stop_state(id).unwrap().current_stop_price.value(),
        dec!(1176)
    );
}

#[test]
fn reconfigure_resets_the_ratchet() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);

    w.engine.configure(id, eth(), dec!(1000), 200, 3600, t(0)).unwrap();
    w.oracle.set_price(&eth(), 120_000_000_000, 8, t(3601));
    w.engine.update(id, KEEPER, t(3601)).unwrap();
    assert_eq!(w.engine.stop_state(id).unwrap().current_stop_price.value(), dec!(1176));

    // a fresh configure replaces the ratcheted state wholesale
    w.engine.configure(id, eth(), dec!(900), 100, 600, t(4000)).unwrap();
    let state = w.engine.stop_state(id).unwrap();
    assert_eq!(state.current_stop_price.value(), dec!(900));
    assert_eq!(state.trailing_distance.value(), 100);
    assert_eq!(state.last_update_at, t(4000));
}

#[test]
fn pruned_order_reverts_to_not_configured() {
    let w = world(RatchetPolicy::MonotonicTighten);
    let id = OrderId::from_low_u64(1);
    w.engine.configure(id, eth(), dec!(1000), 200, 3600, t(0)).unwrap();

    // external cleanup policy retires the filled order
    let removed = w.registry.remove(id).unwrap();
    assert_eq!(removed.initial_stop_price.value(), dec!(1000));

    assert!(matches!(
        w.engine.update(id, KEEPER, t(9999)),
        Err(StopError::NotConfigured(_))
    ));
    assert!(matches!(
        w.engine.validate_trigger(id, Price::new_unchecked(dec!(1)), t(9999)),
        Err(StopError::NotConfigured(_))
    ));
    assert!(w.scheduler.check_due(&[id], t(9999)).is_empty());
}
