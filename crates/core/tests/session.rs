mod support;

use std::sync::Arc;
use std::time::Duration;

use fleet::{DeviceSessionManager, FleetConfig, FleetError, Remediation, SessionState};
use fleet_protocol::{ConnectFailureReason, DeviceId, TargetApp};
use fleet_runtime::CancellationToken;
use support::{FakeBridge, FakeOpener, FeedBehavior, Focus, distinct_items, services};

fn manager(id: &str, bridge: &Arc<FakeBridge>, opener: &Arc<FakeOpener>) -> DeviceSessionManager {
	DeviceSessionManager::new(DeviceId::new(id), services(bridge.clone(), opener.clone(), FleetConfig::default()))
}

#[tokio::test(start_paused = true)]
async fn network_device_succeeds_on_fourth_attempt_with_one_cleanup() {
	let device = "192.168.1.5:5555";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let opener = Arc::new(FakeOpener::new(distinct_items(3, "10")).fail_first(device, 3));

	let mut manager = manager(device, &bridge, &opener);
	let session = manager.connect(&CancellationToken::new()).await.unwrap();

	assert_eq!(opener.open_count(device), 4);
	assert_eq!(bridge.shell_count(device, "pkill"), 1);
	assert!(bridge.host_commands().is_empty(), "no connection reset expected: {:?}", bridge.host_commands());

	let remediations: Vec<_> = session.attempts().iter().map(|record| record.remediation).collect();
	assert_eq!(remediations, vec![None, Some(Remediation::CleanupAutomationServer), None]);
	assert_eq!(session.system_port(), 8200);
	assert_eq!(opener.opens.lock().unwrap()[0].webview_devtools_port(), 9222);
	assert_eq!(manager.state(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn usb_device_exhausts_budget_with_reset_and_port_redraw() {
	let device = "R58M12ABCDE";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let mut opener = FakeOpener::new(Vec::new());
	opener.always_fail.insert(DeviceId::new(device));
	let opener = Arc::new(opener);

	let mut manager = manager(device, &bridge, &opener);
	let err = manager.connect(&CancellationToken::new()).await.err().unwrap();

	let failure = match err {
		FleetError::Connection(failure) => failure,
		other => panic!("expected connection failure, got {other:?}"),
	};
	assert_eq!(failure.reason, ConnectFailureReason::NegotiationExhausted);
	assert_eq!(failure.attempts.len(), 6);
	assert!(failure.last_error.as_deref().unwrap().contains("instrumentation"));
	assert!(failure.diagnostic.as_deref().unwrap().contains("cable"));

	assert_eq!(opener.ports_for(device), vec![8200, 8200, 8200, 8200, 8201, 8201]);
	assert_eq!(bridge.host_commands(), vec!["kill-server", "start-server"]);
	// pre-check plus the attempt-2 cleanup
	assert_eq!(bridge.shell_count(device, "pkill"), 2);
	assert_eq!(manager.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn missing_package_fails_requirements_without_opening() {
	let device = "R58M12ABCDE";
	let mut bridge = FakeBridge::with_devices(&[device]);
	bridge.missing_package.insert(DeviceId::new(device));
	let bridge = Arc::new(bridge);
	let opener = Arc::new(FakeOpener::new(Vec::new()));

	let err = manager(device, &bridge, &opener).connect(&CancellationToken::new()).await.err().unwrap();
	assert!(matches!(err, FleetError::Connection(ref f) if f.reason == ConnectFailureReason::RequirementsUnmet));
	assert_eq!(opener.open_count(device), 0);
}

#[tokio::test(start_paused = true)]
async fn usb_precheck_failure_resets_then_reports_unstable() {
	let device = "R58M12ABCDE";
	let mut bridge = FakeBridge::with_devices(&[device]);
	bridge.process_listing_fails = true;
	bridge.offline_after_reset = true;
	let bridge = Arc::new(bridge);
	let opener = Arc::new(FakeOpener::new(Vec::new()));

	let err = manager(device, &bridge, &opener).connect(&CancellationToken::new()).await.err().unwrap();
	assert!(matches!(err, FleetError::Connection(ref f) if f.reason == ConnectFailureReason::UsbUnstable));
	assert_eq!(bridge.host_commands(), vec!["kill-server", "start-server"]);
	assert_eq!(opener.open_count(device), 0);
}

#[tokio::test(start_paused = true)]
async fn close_twice_releases_once() {
	let device = "10.0.0.9:5555";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let opener = Arc::new(FakeOpener::new(distinct_items(1, "10")));

	let mut session = manager(device, &bridge, &opener).connect(&CancellationToken::new()).await.unwrap();
	session.close().await;
	session.close().await;

	assert_eq!(opener.quit_count(), 1);
	assert_eq!(session.state(), SessionState::Closed);
	assert!(matches!(session.ui(), Err(FleetError::SessionClosed(_))));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
	let device = "10.0.0.9:5555";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let mut opener = FakeOpener::new(Vec::new());
	opener.always_fail.insert(DeviceId::new(device));
	let opener = Arc::new(opener);

	let token = CancellationToken::new();
	let stopper = token.clone();
	tokio::spawn(async move {
		tokio::time::sleep(Duration::from_secs(4)).await;
		stopper.cancel();
	});

	let mut manager = manager(device, &bridge, &opener);
	let err = manager.connect(&token).await.err().unwrap();
	assert!(err.is_cancelled());
	assert_eq!(opener.open_count(device), 1);
	assert_eq!(manager.state(), SessionState::Closed);
}

fn start_count(bridge: &FakeBridge, device: &str, component: &str) -> usize {
	bridge.shell_count(device, &format!("am start -n {component}"))
}

#[tokio::test(start_paused = true)]
async fn background_app_is_brought_to_front_before_negotiating() {
	let device = "10.0.0.3:5555";
	let target = TargetApp::default();
	let bridge = Arc::new(FakeBridge::with_devices(&[device]).with_focus(&[Focus::Background, Focus::Front]));
	let opener = Arc::new(FakeOpener::new(distinct_items(1, "10")));

	manager(device, &bridge, &opener).connect(&CancellationToken::new()).await.unwrap();

	assert_eq!(start_count(&bridge, device, &target.main_component()), 1);
	assert_eq!(bridge.shell_count(device, "am start -a"), 0);
	assert_eq!(opener.open_count(device), 1);
}

#[tokio::test(start_paused = true)]
async fn absent_app_falls_back_to_launch_activity() {
	let device = "10.0.0.3:5555";
	let target = TargetApp::default();
	let bridge = Arc::new(FakeBridge::with_devices(&[device]).with_focus(&[Focus::Absent, Focus::Absent, Focus::Front]));
	let opener = Arc::new(FakeOpener::new(distinct_items(1, "10")));

	manager(device, &bridge, &opener).connect(&CancellationToken::new()).await.unwrap();

	assert_eq!(start_count(&bridge, device, &target.main_component()), 1);
	assert_eq!(start_count(&bridge, device, &target.launch_component()), 1);
	assert_eq!(bridge.shell_count(device, "dumpsys window"), 3);
}

#[tokio::test(start_paused = true)]
async fn unsettled_foreground_is_reconciled_between_attempts() {
	let device = "10.0.0.3:5555";
	let bridge = Arc::new(FakeBridge::with_devices(&[device]).with_focus(&[Focus::Background, Focus::Background, Focus::Background, Focus::Front]));
	let opener = Arc::new(FakeOpener::new(distinct_items(1, "10")).fail_first(device, 1));

	manager(device, &bridge, &opener).connect(&CancellationToken::new()).await.unwrap();

	// main intent plus launcher-intent retry, both before the first attempt
	assert_eq!(bridge.shell_count(device, "am start"), 2);
	assert_eq!(bridge.shell_count(device, "am start -a"), 1);
	// three probes during the initial reconcile, one after the failed attempt
	assert_eq!(bridge.shell_count(device, "dumpsys window"), 4);
	assert_eq!(opener.open_count(device), 2);
}

#[tokio::test(start_paused = true)]
async fn foreign_app_after_connect_is_sent_back() {
	let device = "10.0.0.3:5555";
	let target = TargetApp::default();
	let bridge = Arc::new(FakeBridge::with_devices(&[device]));
	let mut opener = FakeOpener::new(distinct_items(1, "10"));
	opener.behavior = FeedBehavior {
		foreground_package: Some("com.android.launcher3".to_string()),
		..FeedBehavior::default()
	};
	let opener = Arc::new(opener);

	let mut manager = manager(device, &bridge, &opener);
	manager.connect(&CancellationToken::new()).await.unwrap();

	assert_eq!(start_count(&bridge, device, &target.main_component()), 1);
	assert_eq!(manager.state(), SessionState::Connected);
}
