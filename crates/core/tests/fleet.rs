mod support;

use std::sync::Arc;
use std::time::Duration;

use fleet::{DeleteAction, Fleet, FleetConfig, SweepWorkflow, TraversalBudget, TraversalEngine};
use fleet_protocol::{ConnectFailureReason, DeviceId, DeviceStatus, StopReason};
use fleet_runtime::CancellationToken;
use support::{FakeBridge, FakeOpener, FeedBehavior, distinct_items, services};

fn sweep(config: &FleetConfig, threshold: u64) -> Arc<SweepWorkflow> {
	let action = Arc::new(DeleteAction::new(config.selectors.delete.clone(), config.timings));
	Arc::new(SweepWorkflow::new(TraversalEngine::new(config, action), threshold))
}

#[tokio::test(start_paused = true)]
async fn invalid_device_does_not_affect_sibling() {
	let (bad, good) = ("R58M-BAD", "R58M-GOOD");
	let mut bridge = FakeBridge::with_devices(&[bad, good]);
	bridge.unreachable.insert(DeviceId::new(bad));
	let bridge = Arc::new(bridge);
	let opener = Arc::new(FakeOpener::new(distinct_items(4, "900")));
	let config = FleetConfig::default();
	let fleet = Fleet::new(services(bridge, opener.clone(), config.clone()));

	let token = CancellationToken::new();
	let devices = fleet.enumerate(&token).await.unwrap();
	let report = fleet.run(devices, sweep(&config, 100), &token).await;

	assert_eq!(report.outcomes.len(), 2);
	assert_eq!(report.outcomes[0].device.as_str(), bad);
	assert!(matches!(
		report.outcomes[0].status,
		DeviceStatus::ConnectFailed {
			reason: ConnectFailureReason::DeviceInvalid,
			..
		}
	));
	assert_eq!(opener.open_count(bad), 0);

	let DeviceStatus::Completed { report: traversal } = &report.outcomes[1].status else {
		panic!("expected completed traversal, got {:?}", report.outcomes[1].status);
	};
	assert_eq!(traversal.processed, 4);
	assert_eq!(traversal.stop_reason, StopReason::FeedExhausted);
	assert_eq!(opener.open_count(good), 1);
	assert_eq!(opener.quit_count(), 1);
	assert!(!report.timed_out);
	assert_eq!(report.completed(), 1);
}

#[tokio::test(start_paused = true)]
async fn deadline_reports_stuck_workers_as_timed_out() {
	let device = "10.0.0.7:5555";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let mut opener = FakeOpener::new(Vec::new());
	opener.hang = true;
	let opener = Arc::new(opener);
	let config = FleetConfig {
		deadline_secs: 60,
		..FleetConfig::default()
	};
	let fleet = Fleet::new(services(bridge, opener, config.clone()));

	let report = fleet.run(vec![DeviceId::new(device)], sweep(&config, 100), &CancellationToken::new()).await;

	assert!(report.timed_out);
	assert_eq!(report.outcomes.len(), 1);
	assert_eq!(report.outcomes[0].status, DeviceStatus::TimedOut);
}

fn long_sweep_config() -> FleetConfig {
	FleetConfig {
		deadline_secs: 60,
		traversal: TraversalBudget {
			max_items: 10_000,
			..TraversalBudget::default()
		},
		..FleetConfig::default()
	}
}

#[tokio::test(start_paused = true)]
async fn deadline_during_traversal_reports_timed_out() {
	let device = "10.0.0.7:5555";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let opener = Arc::new(FakeOpener::new(distinct_items(500, "900")));
	let config = long_sweep_config();
	let fleet = Fleet::new(services(bridge, opener.clone(), config.clone()));

	let report = fleet.run(vec![DeviceId::new(device)], sweep(&config, 100), &CancellationToken::new()).await;

	assert!(report.timed_out);
	assert_eq!(report.outcomes[0].status, DeviceStatus::TimedOut);
	assert_eq!(report.completed(), 0);
	assert_eq!(opener.quit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_teardown_finishes_after_worker_is_aborted() {
	let device = "10.0.0.7:5555";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let mut opener = FakeOpener::new(distinct_items(500, "900"));
	opener.behavior = FeedBehavior {
		quit_delay: Duration::from_secs(25),
		..FeedBehavior::default()
	};
	let opener = Arc::new(opener);
	let config = long_sweep_config();
	let fleet = Fleet::new(services(bridge, opener.clone(), config.clone()));

	let report = fleet.run(vec![DeviceId::new(device)], sweep(&config, 100), &CancellationToken::new()).await;

	assert_eq!(report.outcomes[0].status, DeviceStatus::TimedOut);
	assert_eq!(opener.quit_count(), 1);
	assert_eq!(fleet.services().teardowns.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_signal_cancels_workers() {
	let device = "10.0.0.8:5555";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let mut opener = FakeOpener::new(Vec::new());
	opener.hang = true;
	let opener = Arc::new(opener);
	let config = FleetConfig::default();
	let fleet = Fleet::new(services(bridge, opener, config.clone()));

	let stop = CancellationToken::new();
	let trigger = stop.clone();
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_secs(10)).await;
		trigger.cancel();
	});

	let report = fleet.run(vec![DeviceId::new(device)], sweep(&config, 100), &stop).await;

	assert!(report.cancelled);
	assert_eq!(report.outcomes[0].status, DeviceStatus::Cancelled);
}
