//! Trailing-Stop Engine Simulation.
//!
//! Walks the full lifecycle: configuration, keeper update cycles against a
//! moving oracle price, trigger validation, and settlement through a swap
//! venue, including the failure paths a keeper has to tolerate.

use rust_decimal_macros::dec;
use std::sync::Arc;
use trailstop_core::*;

struct Sim {
    oracle: Arc<MockOracle>,
    venue: Arc<MockVenue>,
    ledger: Arc<AssetLedger>,
    events: Arc<EventCollector>,
    engine: Arc<TrailingStopEngine>,
    gateway: ExecutionGateway,
    scheduler: AutomationScheduler,
    admin: AdminGate,
}

const OWNER: ActorId = ActorId(1);
const KEEPER: ActorId = ActorId(2);
const MAKER: ActorId = ActorId(10);
const CUSTODIAN: ActorId = ActorId(99);

fn build_sim(policy: RatchetPolicy) -> Sim {
    let oracle = Arc::new(MockOracle::new());
    let venue = Arc::new(MockVenue::new("sim-venue", VenueMode::Quote(dec!(0))));
    let ledger = Arc::new(AssetLedger::new());
    let events = Arc::new(EventCollector::new());
    let pause = Arc::new(PauseSwitch::new());

    let engine = Arc::new(TrailingStopEngine::new(
        EngineConfig::default().with_policy(policy),
        Arc::new(TrailingStopRegistry::new()),
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

    Sim {
        oracle,
        venue,
        ledger,
        events,
        engine,
        gateway,
        scheduler,
        admin,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Trailing-Stop Order Engine Simulation");
    println!("Configure, Ratchet, Trigger, Settle\n");

    scenario_1_ratchet_lifecycle();
    scenario_2_policy_comparison();
    scenario_3_trigger_and_settlement();
    scenario_4_keeper_failure_tolerance();
    scenario_5_pause_switch();

    println!("\nAll simulations completed successfully.");
}

/// A rising market walks the stop up behind it.
fn scenario_1_ratchet_lifecycle() {
    println!("Scenario 1: Ratchet Lifecycle\n");

    let sim = build_sim(RatchetPolicy::MonotonicTighten);
    let order = OrderId::from_low_u64(1);
    let eth = OracleRef::new("ETH/USD");

    sim.admin
        .configure(OWNER, order, eth.clone(), dec!(1000), 200, 3600, Timestamp::from_secs(0))
        .unwrap();
    println!("  Configured: stop $1000, distance 200 bps, frequency 3600s");

    for (hour, price_e8) in [(1i64, 105_000_000_000i128), (2, 110_000_000_000), (3, 120_000_000_000)] {
        let now = Timestamp::from_secs(hour * 3600 + 1);
        sim.oracle.set_price(&eth, price_e8, 8, now);
        let outcomes = sim.scheduler.run_cycle(&[order], now);
        let state = sim.engine.stop_state(order).unwrap();
        println!(
            "  Cycle at t={now}: {} outcome(s), stop now ${}",
            outcomes.len(),
            state.current_stop_price
        );
    }

    println!("  Events recorded: {}\n", sim.events.len());
}

/// Monotonic vs re-peg behavior when the market retraces.
fn scenario_2_policy_comparison() {
    println!("Scenario 2: Ratchet Policy on Retrace\n");

    for policy in [RatchetPolicy::MonotonicTighten, RatchetPolicy::AlwaysRepeg] {
        let sim = build_sim(policy);
        let order = OrderId::from_low_u64(1);
        let eth = OracleRef::new("ETH/USD");

        sim.engine
            .configure(order, eth.clone(), dec!(1000), 200, 3600, Timestamp::from_secs(0))
            .unwrap();

        sim.oracle.set_price(&eth, 120_000_000_000, 8, Timestamp::from_secs(3601));
        sim.engine.update(order, KEEPER, Timestamp::from_secs(3601)).unwrap();

        sim.oracle.set_price(&eth, 115_000_000_000, 8, Timestamp::from_secs(7202));
        sim.engine.update(order, KEEPER, Timestamp::from_secs(7202)).unwrap();

        let state = sim.engine.stop_state(order).unwrap();
        println!(
            "  {:?}: price 1200 -> 1150, final stop ${}",
            policy, state.current_stop_price
        );
    }
    println!();
}

/// Price falls through the stop; the order executes through the venue.
fn scenario_3_trigger_and_settlement() {
    println!("Scenario 3: Trigger and Settlement\n");

    let sim = build_sim(RatchetPolicy::MonotonicTighten);
    let order = OrderId::from_low_u64(7);
    let eth = OracleRef::new("ETH/USD");

    sim.engine
        .configure(order, eth, dec!(980), 200, 3600, Timestamp::from_secs(0))
        .unwrap();
    sim.ledger.credit(MAKER, &AssetId::new("WETH"), dec!(2)).unwrap();
    println!("  Maker holds 2 WETH; stop at $980");

    let observed = Price::new_unchecked(dec!(975));
    let snapshot = sim
        .engine
        .validate_trigger(order, observed, Timestamp::from_secs(100))
        .unwrap();
    println!("  Observed $975 <= stop ${}: trigger validated", snapshot.stop_price);

    sim.venue.set_mode(VenueMode::Quote(dec!(1948)));
    let receipt = sim
        .gateway
        .execute(
            &snapshot,
            &ExecutionRequest {
                order_id: order,
                maker: MAKER,
                receiver: MAKER,
                maker_asset: AssetId::new("WETH"),
                taker_asset: AssetId::new("USDC"),
                making_amount: dec!(2),
                min_acceptable_output: dec!(1940),
                payload: vec![],
            },
            Timestamp::from_secs(101),
        )
        .unwrap();

    println!(
        "  Settled: {} WETH -> {} USDC",
        receipt.making_amount, receipt.actual_output
    );
    println!(
        "  Maker balances: {} WETH, {} USDC\n",
        sim.ledger.balance_of(MAKER, &AssetId::new("WETH")),
        sim.ledger.balance_of(MAKER, &AssetId::new("USDC"))
    );
}

/// One dead feed and one slippage rejection; nothing else is disturbed.
fn scenario_4_keeper_failure_tolerance() {
    println!("Scenario 4: Keeper Failure Tolerance\n");

    let sim = build_sim(RatchetPolicy::MonotonicTighten);
    let healthy = OrderId::from_low_u64(1);
    let broken = OrderId::from_low_u64(2);
    let eth = OracleRef::new("ETH/USD");
    let btc = OracleRef::new("BTC/USD");

    sim.engine
        .configure(healthy, eth.clone(), dec!(1000), 200, 3600, Timestamp::from_secs(0))
        .unwrap();
    sim.engine
        .configure(broken, btc.clone(), dec!(50000), 200, 3600, Timestamp::from_secs(0))
        .unwrap();

    sim.oracle.set_price(&eth, 120_000_000_000, 8, Timestamp::from_secs(3601));
    sim.oracle.take_offline(&btc);

    let outcomes = sim.scheduler.run_cycle(&[healthy, broken], Timestamp::from_secs(3601));
    for outcome in &outcomes {
        match &outcome.status {
            CycleStatus::Updated { new_stop_price, .. } => {
                println!("  {}... updated, stop ${}", &outcome.order_id.to_string()[..10], new_stop_price)
            }
            CycleStatus::Failed(error) => {
                println!("  {}... failed: {}", &outcome.order_id.to_string()[..10], error)
            }
        }
    }

    // slippage: venue quotes below the minimum, the debit rolls back
    sim.ledger.credit(MAKER, &AssetId::new("WETH"), dec!(2)).unwrap();
    sim.venue.set_mode(VenueMode::Quote(dec!(1900)));
    let snapshot = sim
        .engine
        .validate_trigger(healthy, Price::new_unchecked(dec!(900)), Timestamp::from_secs(3700))
        .unwrap();
    let result = sim.gateway.execute(
        &snapshot,
        &ExecutionRequest {
            order_id: healthy,
            maker: MAKER,
            receiver: MAKER,
            maker_asset: AssetId::new("WETH"),
            taker_asset: AssetId::new("USDC"),
            making_amount: dec!(2),
            min_acceptable_output: dec!(1940),
            payload: vec![],
        },
        Timestamp::from_secs(3700),
    );
    println!(
        "  Slippage rejection: {:?}, maker still holds {} WETH\n",
        result.err().map(|e| e.to_string()),
        sim.ledger.balance_of(MAKER, &AssetId::new("WETH"))
    );
}

/// The owner pauses the engine; keepers and executors fail fast.
fn scenario_5_pause_switch() {
    println!("Scenario 5: Pause Switch\n");

    let sim = build_sim(RatchetPolicy::MonotonicTighten);
    let order = OrderId::from_low_u64(1);
    let eth = OracleRef::new("ETH/USD");

    sim.engine
        .configure(order, eth.clone(), dec!(1000), 200, 60, Timestamp::from_secs(0))
        .unwrap();
    sim.oracle.set_price(&eth, 120_000_000_000, 8, Timestamp::from_secs(61));

    sim.admin.pause(OWNER, Timestamp::from_secs(60)).unwrap();
    let outcomes = sim.scheduler.run_cycle(&[order], Timestamp::from_secs(61));
    println!(
        "  While paused: {:?}",
        outcomes[0].status
    );

    sim.admin.unpause(OWNER, Timestamp::from_secs(62)).unwrap();
    let outcomes = sim.scheduler.run_cycle(&[order], Timestamp::from_secs(63));
    println!("  After resume: success = {}", outcomes[0].is_success());
}
