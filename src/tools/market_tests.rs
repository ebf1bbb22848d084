//! Unit tests for the in-process market tools.

#[cfg(test)]
mod market_tests {
    use crate::config::MarketDataConfig;
    use crate::data::test_source::{bar, market_rows, ScriptedSource};
    use crate::data::{Adjust, MarketData, RetryPolicy};
    use crate::error::{ResolveError, ToolError};
    use crate::tools::market::{
        MarketTools, GET_DAILY_HISTORY, GET_FUNDAMENTALS, GET_REALTIME_QUOTE, RESOLVE_SYMBOL,
    };
    use crate::tools::{ToolCall, ToolGateway};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn tools_over(source: Arc<ScriptedSource>) -> MarketTools {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
            backoff_factor: 1.0,
            jitter: Duration::ZERO,
        };
        let config = MarketDataConfig {
            top_n: 5,
            history_days: 3,
            ..MarketDataConfig::default()
        };
        MarketTools::new(MarketData::new(source, policy, Duration::from_secs(10)), &config)
    }

    fn default_tools() -> MarketTools {
        let bars = vec![
            bar("2025-01-02", 10.0),
            bar("2025-01-03", 11.0),
            bar("2025-01-06", 12.0),
            bar("2025-01-07", 13.0),
            bar("2025-01-08", 14.0),
        ];
        tools_over(Arc::new(ScriptedSource::new(market_rows()).with_bars(bars)))
    }

    #[tokio::test]
    async fn test_list_tools() {
        let tools = default_tools().list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();

        assert_eq!(
            names,
            vec![RESOLVE_SYMBOL, GET_REALTIME_QUOTE, GET_DAILY_HISTORY, GET_FUNDAMENTALS]
        );
        for t in &tools {
            assert_eq!(t.parameters["type"], "object");
            assert!(t.parameters["required"].is_array());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_symbol_uses_configured_top_n() {
        let payload = default_tools()
            .call_tool(RESOLVE_SYMBOL, json!({"query": "银行"}))
            .await
            .unwrap();

        assert_eq!(payload["candidates"].as_array().unwrap().len(), 5);
        assert_eq!(payload["primary"]["name"], "测试银行14");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_symbol_explicit_top_n() {
        let payload = default_tools()
            .call_tool(RESOLVE_SYMBOL, json!({"query": "银行", "top_n": 2}))
            .await
            .unwrap();

        assert_eq!(payload["candidates"].as_array().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_quote() {
        let payload = default_tools()
            .call_tool(GET_REALTIME_QUOTE, json!({"code": "600519"}))
            .await
            .unwrap();

        assert_eq!(payload["code"], "600519");
        assert_eq!(payload["name"], "贵州茅台");
        assert_eq!(payload["latest"], 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_realtime_quote_unknown_code() {
        let err = default_tools()
            .call_tool(GET_REALTIME_QUOTE, json!({"code": "999999"}))
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::Data(ResolveError::UnknownCode { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fundamentals_tool() {
        let payload = default_tools()
            .call_tool(GET_FUNDAMENTALS, json!({"code": "600519"}))
            .await
            .unwrap();

        assert_eq!(payload["code"], "600519");
        assert_eq!(payload["pe_dynamic"], 12.5);
        assert_eq!(payload["pb"], 1.1);
        assert_eq!(payload["total_market_cap"], 2.0e10);

        let err = default_tools()
            .call_tool(GET_FUNDAMENTALS, json!({"code": "999999"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Data(ResolveError::UnknownCode { .. })));

        let err = default_tools().call_tool(GET_FUNDAMENTALS, json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_history_defaults() {
        let source = Arc::new(ScriptedSource::new(vec![]).with_bars(vec![
            bar("2025-01-02", 10.0),
            bar("2025-01-03", 11.0),
            bar("2025-01-06", 12.0),
            bar("2025-01-07", 13.0),
        ]));
        let tools = tools_over(source.clone());

        let payload = tools
            .call_tool(GET_DAILY_HISTORY, json!({"code": "600519"}))
            .await
            .unwrap();

        assert_eq!(payload["code"], "600519");
        assert_eq!(payload["adjust"], "qfq");
        let bars = payload["bars"].as_array().unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[2]["date"], "2025-01-07");
        assert_eq!(*source.last_adjust.lock().unwrap(), Some(Adjust::Qfq));
    }

    #[tokio::test(start_paused = true)]
    async fn test_daily_history_arguments() {
        let payload = default_tools()
            .call_tool(GET_DAILY_HISTORY, json!({"code": "600519", "days": "2", "adjust": "hfq"}))
            .await
            .unwrap();

        assert_eq!(payload["adjust"], "hfq");
        assert_eq!(payload["bars"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let tools = default_tools();

        let err = tools.call_tool(GET_REALTIME_QUOTE, json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));

        let err = tools
            .call_tool(GET_DAILY_HISTORY, json!({"code": "600519", "adjust": "weekly"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { reason, .. } if reason.contains("weekly")));

        let err = tools
            .call_tool(RESOLVE_SYMBOL, json!({"query": "银行", "top_n": -1}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = default_tools().call_tool("place_order", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { name } if name == "place_order"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_data_becomes_failed_result() {
        let tools = tools_over(Arc::new(ScriptedSource::new(market_rows()).failing_first(10)));
        let call = ToolCall {
            id: "call_9".to_string(),
            name: GET_REALTIME_QUOTE.to_string(),
            arguments: r#"{"code": "600519"}"#.to_string(),
        };

        let result = tools.invoke(&call).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Data temporarily unavailable"));
    }
}
