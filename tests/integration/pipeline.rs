//! End-to-end monitor cycles: venues → analyzer → validator → router →
//! {paper executor | WebSocket engine} → stats.

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::assert_ok;

    use fundbridge::config::{AnalyzerConfig, LocalConfig, MonitorConfig, ValidatorConfig};
    use fundbridge::dashboard::DashboardState;
    use fundbridge::engine::bridge::RemoteExecutionBridge;
    use fundbridge::engine::local::PaperExecutor;
    use fundbridge::engine::monitor::{shutdown_channel, LoopState, MonitorLoop};
    use fundbridge::engine::router::ExecutionRouter;
    use fundbridge::engine::snapshot::{FundingSnapshotSource, VenueSnapshotSource};
    use fundbridge::strategy::{OpportunityAnalyzer, StrategyValidator};
    use fundbridge::venues::VenueConnector;

    use crate::mock_engine::MockEngine;
    use crate::mock_venue::MockVenue;

    const BTC: &str = "BTC/USDT:USDT";
    const ETH: &str = "ETH/USDT:USDT";

    fn venues() -> (MockVenue, MockVenue) {
        let binance = MockVenue::new("binance")
            .with_rate(BTC, dec!(0.0001))
            .with_rate(ETH, dec!(0.0));
        let okx = MockVenue::new("okx")
            .with_rate(BTC, dec!(0.0035))
            .with_rate(ETH, dec!(0.008));
        (binance, okx)
    }

    fn source(venues: &[&MockVenue]) -> Arc<VenueSnapshotSource> {
        let connectors: Vec<Box<dyn VenueConnector>> = venues
            .iter()
            .map(|v| Box::new((*v).clone()) as Box<dyn VenueConnector>)
            .collect();
        Arc::new(VenueSnapshotSource::new(
            connectors,
            vec![BTC.to_string(), ETH.to_string()],
        ))
    }

    fn monitor(source: Arc<VenueSnapshotSource>, endpoint: &str, timeout: Duration) -> MonitorLoop {
        let remote = RemoteExecutionBridge::with_timeouts(
            endpoint,
            timeout,
            Duration::from_secs(2),
            dec!(10000),
        );
        MonitorLoop::new(
            &MonitorConfig::default(),
            source,
            OpportunityAnalyzer::new(AnalyzerConfig::default()),
            StrategyValidator::new(ValidatorConfig::default()),
            ExecutionRouter::new(
                Arc::new(remote),
                Arc::new(PaperExecutor::new(&LocalConfig::default())),
            ),
        )
    }

    #[tokio::test]
    async fn test_cycle_routes_local_and_remote() {
        let engine = MockEngine::start(dec!(75.5)).await;
        let (binance, okx) = venues();
        let mut monitor = monitor(
            source(&[&binance, &okx]),
            &engine.endpoint,
            Duration::from_secs(5),
        );

        let report = monitor.run_cycle().await;
        assert!(report.is_ok(), "cycle failed: {:?}", report.error);
        assert_eq!(report.symbols_scanned, 2);
        assert_eq!(report.candidates, 2);
        assert_eq!(report.dispatched_local, 1);
        assert_eq!(report.dispatched_remote, 1);

        // BTC: diff 0.0034, est 34, paper books 80% = 27.2. ETH: remote 75.5.
        let stats = monitor.stats().snapshot();
        assert_eq!(stats.local_executions, 1);
        assert_eq!(stats.remote_executions, 1);
        assert_eq!(stats.total_profit, dec!(102.7));
        assert_eq!(report.cycle_profit, dec!(102.7));

        let requests = engine.requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req["type"], "funding_rate_arbitrage");
        assert_eq!(req["symbol"], ETH);
        assert_eq!(req["primary_exchange"], "okx");
        assert_eq!(req["secondary_exchange"], "binance");
        assert_eq!(req["priority"], 8);
        assert_eq!(req["amount"].as_f64(), Some(10000.0));
    }

    #[tokio::test]
    async fn test_engine_down_fails_remote_only() {
        let port = {
            let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let (binance, okx) = venues();
        let mut monitor = monitor(
            source(&[&binance, &okx]),
            &format!("ws://127.0.0.1:{port}"),
            Duration::from_secs(1),
        );

        let report = monitor.run_cycle().await;
        assert!(report.is_ok());
        assert_eq!(report.failed, 1);

        let stats = monitor.stats().snapshot();
        assert_eq!(stats.remote_executions, 1);
        assert_eq!(stats.failed_executions, 1);
        assert_eq!(stats.total_profit, dec!(27.2));
        // Dispatched strategies are recorded whatever their outcome.
        assert_eq!(monitor.history().len(), 2);
    }

    #[tokio::test]
    async fn test_single_venue_yields_no_candidates() {
        let engine = MockEngine::start(dec!(1)).await;
        let (binance, _) = venues();
        let mut monitor = monitor(source(&[&binance]), &engine.endpoint, Duration::from_secs(1));

        let report = monitor.run_cycle().await;
        assert!(report.is_ok());
        assert_eq!(report.candidates, 0);
        assert_eq!(monitor.stats().total_executions(), 0);
        assert!(engine.requests().is_empty());
    }

    #[tokio::test]
    async fn test_venue_outage_then_recovery() {
        let engine = MockEngine::start(dec!(10)).await;
        let (binance, okx) = venues();
        let source = source(&[&binance, &okx]);
        binance.set_error("maintenance");
        okx.set_error("maintenance");

        assert!(source.fetch().await.is_err());
        let mut monitor = monitor(source.clone(), &engine.endpoint, Duration::from_secs(2));
        let report = monitor.run_cycle().await;
        assert!(!report.is_ok());

        binance.clear_error();
        okx.clear_error();
        let snapshot = assert_ok!(source.fetch().await);
        assert_eq!(snapshot.quote_count(), 4);
        assert!(monitor.run_cycle().await.is_ok());
    }

    #[tokio::test]
    async fn test_run_until_shutdown_with_dashboard() {
        let engine = MockEngine::start(dec!(50)).await;
        let (binance, okx) = venues();
        let dashboard = Arc::new(DashboardState::new());
        let mut monitor = monitor(source(&[&binance, &okx]), &engine.endpoint, Duration::from_secs(2))
            .with_intervals(Duration::from_millis(20), Duration::from_millis(20))
            .with_dashboard(dashboard.clone());

        let (trigger, token) = shutdown_channel();
        let handle = tokio::spawn(async move {
            monitor.run(token).await;
            monitor
        });
        tokio::time::sleep(Duration::from_millis(250)).await;
        trigger.trigger();
        let monitor = handle.await.unwrap();

        assert_eq!(monitor.state(), LoopState::Stopped);
        let stats = dashboard.stats.read().await.clone();
        assert!(stats.cycles_completed >= 2);
        assert_eq!(stats.cycles_failed, 0);
        // Identical opportunities every cycle; all prior dispatches were
        // profitable, so nothing is filtered.
        assert_eq!(stats.local_executions, stats.cycles_completed);
        assert_eq!(stats.remote_executions, stats.cycles_completed);
        assert_eq!(stats.ratio, Decimal::ONE);
        assert_eq!(engine.requests().len() as u64, stats.remote_executions);
    }
}
