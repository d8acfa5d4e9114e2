#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;
    use std::path::PathBuf;
    use std::process::{Output, Stdio};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, OnceLock};
    use std::time::{SystemTime, UNIX_EPOCH};

    use anyhow::{Context, Result, anyhow, bail};
    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use client_sdk::{ClientError, WatchdogClient};
    use common::auth::{now_unix, parse_bearer};
    use common::config::{HostEndpoint, WatchdogConfig};
    use common::{HostInfo, LoginRequest, LoginResponse, MinerInfo};
    use serde::Deserialize;
    use tokio::io::AsyncWriteExt;
    use tokio::process::Command;
    use tokio::sync::Mutex;

    const USERNAME: &str = "admin";
    const PASSWORD: &str = "secret";

    #[derive(Clone, Default)]
    struct StubState {
        issued: Arc<Mutex<HashSet<String>>>,
        config: Arc<Mutex<WatchdogConfig>>,
        config_posts: Arc<AtomicUsize>,
    }

    #[derive(Debug, Deserialize)]
    struct ListQuery {
        host: Option<String>,
    }

    #[tokio::test]
    async fn sdk_login_then_hosts_in_natural_order() -> Result<()> {
        let (base_url, _state) = start_stub_api().await?;
        let client = WatchdogClient::new(&base_url)?;

        let login = client.login(USERNAME, PASSWORD).await?;
        assert!(!login.token.is_empty());
        assert_eq!(client.token().await.as_deref(), Some(login.token.as_str()));

        let hosts = client.hosts().await?;
        assert_eq!(hosts, vec!["10.0.0.3", "10.0.0.12", "10.0.0.100"]);
        Ok(())
    }

    #[tokio::test]
    async fn sdk_miners_come_back_sorted_by_signature_account() -> Result<()> {
        let (base_url, _state) = start_stub_api().await?;
        let client = WatchdogClient::new(&base_url)?;
        client.login(USERNAME, PASSWORD).await?;

        let hosts = client.host_info(None).await?;
        let names: Vec<&str> = hosts.iter().map(|host| host.host.as_str()).collect();
        assert_eq!(names, vec!["10.0.0.3", "10.0.0.12", "10.0.0.100"]);

        let accounts: Vec<&str> = hosts[0]
            .miner_info_list
            .iter()
            .map(|miner| miner.signature_acc.as_str())
            .collect();
        assert_eq!(accounts, vec!["cXacc1", "cXacc2", "cXacc10"]);

        let single = client.host_info(Some("10.0.0.12")).await?;
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].host, "10.0.0.12");
        Ok(())
    }

    #[tokio::test]
    async fn wrong_credentials_are_rejected() -> Result<()> {
        let (base_url, _state) = start_stub_api().await?;
        let client = WatchdogClient::new(&base_url)?;

        let err = client.login(USERNAME, "wrong").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ClientError>(),
            Some(&ClientError::Unauthorized(
                "Invalid username or password".to_string()
            ))
        );
        assert_eq!(client.token().await, None);
        Ok(())
    }

    #[tokio::test]
    async fn server_rejection_clears_session() -> Result<()> {
        let (base_url, _state) = start_stub_api().await?;
        let client = WatchdogClient::new(&base_url)?;
        client.set_token(token_expiring_at(now_unix() + 600)).await;

        let err = client.hosts().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Unauthorized(_))
        ));
        assert_eq!(client.token().await, None);

        let err = client.hosts().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ClientError>(),
            Some(&ClientError::NotLoggedIn)
        );
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_never_reaches_the_server() -> Result<()> {
        let (base_url, state) = start_stub_api().await?;
        let client = WatchdogClient::new(&base_url)?;
        let expired = token_expiring_at(now_unix() - 60);
        state.issued.lock().await.insert(expired.clone());
        client.set_token(&expired).await;

        let err = client.config().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ClientError>(),
            Some(&ClientError::SessionExpired)
        );
        Ok(())
    }

    #[tokio::test]
    async fn config_update_round_trips() -> Result<()> {
        let (base_url, state) = start_stub_api().await?;
        let client = WatchdogClient::new(&base_url)?;
        client.login(USERNAME, PASSWORD).await?;

        let mut config = client.config().await?;
        assert_eq!(config.port, 13081);
        assert_eq!(config.scrape_interval, 60);

        config.scrape_interval = 30;
        config.hosts.push(HostEndpoint::new("10.0.0.3", "2375"));
        config
            .alert
            .webhook
            .push("https://hooks.slack.com/services/T0".to_string());

        let message = client.set_config(&config).await?;
        assert!(message.contains("success"));
        assert_eq!(state.config_posts.load(Ordering::SeqCst), 1);

        let fetched = client.config().await?;
        assert_eq!(fetched, config);
        Ok(())
    }

    #[tokio::test]
    async fn invalid_config_is_not_submitted() -> Result<()> {
        let (base_url, state) = start_stub_api().await?;
        let client = WatchdogClient::new(&base_url)?;
        client.login(USERNAME, PASSWORD).await?;

        let config = WatchdogConfig {
            hosts: vec![HostEndpoint::new("", "2375")],
            ..WatchdogConfig::default()
        };

        let err = client.set_config(&config).await.unwrap_err();
        assert!(err.to_string().contains("IP address is required"));
        assert_eq!(state.config_posts.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn cli_sorts_stdin_naturally() -> Result<()> {
        let output = run_cli_with_stdin(&["sort"], "acc10\nacc2\nacc1\n").await?;
        assert_eq!(output, "acc1\nacc2\nacc10\n");

        let output = run_cli_with_stdin(&["sort", "--reverse"], "item1\nitem\n").await?;
        assert_eq!(output, "item1\nitem\n");
        Ok(())
    }

    #[tokio::test]
    async fn cli_compare_prints_sign() -> Result<()> {
        assert_eq!(run_cli(&["compare", "acc2", "acc10"]).await?.trim(), "-1");
        assert_eq!(run_cli(&["compare", "007", "7"]).await?.trim(), "0");
        assert_eq!(run_cli(&["compare", "abd", "abc"]).await?.trim(), "1");
        Ok(())
    }

    #[tokio::test]
    async fn cli_lists_miners_for_host() -> Result<()> {
        let (base_url, _state) = start_stub_api().await?;

        let output = run_cli(&[
            "--api-url",
            &base_url,
            "--username",
            USERNAME,
            "--password",
            PASSWORD,
            "miners",
            "--host",
            "10.0.0.3",
        ])
        .await?;

        assert!(output.contains("Host 10.0.0.3"));
        let first = output.find("cXacc1 ").context("missing cXacc1 row")?;
        let second = output.find("cXacc2 ").context("missing cXacc2 row")?;
        let tenth = output.find("cXacc10").context("missing cXacc10 row")?;
        assert!(first < second && second < tenth);
        assert!(output.contains("1 frozen"));
        assert!(!output.contains("Host 10.0.0.12"));
        Ok(())
    }

    #[tokio::test]
    async fn cli_lists_hosts_in_natural_order() -> Result<()> {
        let (base_url, _state) = start_stub_api().await?;

        let output = run_cli(&[
            "--api-url",
            &base_url,
            "--username",
            USERNAME,
            "--password",
            PASSWORD,
            "hosts",
        ])
        .await?;

        assert_eq!(output, "10.0.0.3\n10.0.0.12\n10.0.0.100\n");
        Ok(())
    }

    #[tokio::test]
    async fn cli_config_check_reports_hosts_and_webhooks() -> Result<()> {
        let path = write_config_file(
            "check-valid",
            &serde_json::json!({
                "scrapeInterval": 30,
                "hosts": [
                    {"IP": "10.0.0.3", "Port": 2375},
                    {"IP": "10.0.0.4", "Port": "2376", "CAPath": "/ca.pem", "CertPath": "/cert.pem", "KeyPath": "/key.pem"}
                ],
                "alert": {"enable": true, "webhook": ["https://hooks.slack.com/services/T0"]}
            }),
        )?;
        let path = path.to_string_lossy().to_string();

        let output = run_cli(&["config", "check", &path]).await?;

        assert!(output.contains("webhook slack: https://hooks.slack.com/services/T0"));
        assert!(output.contains("host 10.0.0.3:2375 (plain)"));
        assert!(output.contains("host 10.0.0.4:2376 (tls)"));
        assert!(output.contains("config ok: 2 host(s)"));
        Ok(())
    }

    #[tokio::test]
    async fn cli_config_check_rejects_invalid_file() -> Result<()> {
        let path = write_config_file(
            "check-invalid",
            &serde_json::json!({
                "scrapeInterval": -5,
                "hosts": [{"IP": "", "Port": "2375"}]
            }),
        )?;
        let path = path.to_string_lossy().to_string();

        let output = cli_output(&["config", "check", &path], None).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        assert!(!output.status.success());
        assert!(!stdout.contains("config ok"));
        assert!(stderr.contains("Interval must be a positive number"));
        assert!(stderr.contains("IP address is required"));
        Ok(())
    }

    #[tokio::test]
    async fn cli_config_push_replaces_server_config() -> Result<()> {
        let (base_url, state) = start_stub_api().await?;
        let path = write_config_file(
            "push",
            &serde_json::json!({
                "scrapeInterval": 15,
                "hosts": [{"IP": "10.0.0.7", "Port": "2375"}]
            }),
        )?;
        let path = path.to_string_lossy().to_string();

        let output = run_cli(&[
            "--api-url",
            &base_url,
            "--username",
            USERNAME,
            "--password",
            PASSWORD,
            "config",
            "push",
            &path,
        ])
        .await?;

        assert!(output.contains("success"));
        assert_eq!(state.config_posts.load(Ordering::SeqCst), 1);
        let stored = state.config.lock().await.clone();
        assert_eq!(stored.scrape_interval, 15);
        assert_eq!(stored.hosts, vec![HostEndpoint::new("10.0.0.7", "2375")]);
        Ok(())
    }

    #[tokio::test]
    async fn cli_token_status_reports_expiry() -> Result<()> {
        let valid = token_expiring_at(now_unix() + 3600);
        let output = run_cli(&["--token", &valid, "token-status"]).await?;
        assert!(output.starts_with("valid until "));
        assert!(output.contains("s remaining)"));

        let expired = format!("Bearer {}", token_expiring_at(now_unix() - 60));
        let output = run_cli(&["--token", &expired, "token-status"]).await?;
        assert!(output.starts_with("expired at "));
        Ok(())
    }

    async fn start_stub_api() -> Result<(String, StubState)> {
        let state = StubState::default();
        let app = Router::new()
            .route("/login", post(stub_login))
            .route("/hosts", get(stub_hosts))
            .route("/list", get(stub_list))
            .route("/config", get(stub_get_config).post(stub_set_config))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind stub api")?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok((format!("http://{addr}"), state))
    }

    fn token_expiring_at(exp: i64) -> String {
        let payload = serde_json::json!({ "username": USERNAME, "exp": exp, "iat": exp - 3600 });
        format!(
            "{}.{}.stub-signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    fn unauthorized() -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid or expired token" })),
        )
            .into_response()
    }

    async fn is_authorized(state: &StubState, headers: &HeaderMap) -> bool {
        let Some(token) = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer)
        else {
            return false;
        };
        state.issued.lock().await.contains(token)
    }

    async fn stub_login(State(state): State<StubState>, Json(request): Json<LoginRequest>) -> Response {
        if request.username != USERNAME || request.password != PASSWORD {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Invalid username or password" })),
            )
                .into_response();
        }

        let token = token_expiring_at(now_unix() + 3600);
        state.issued.lock().await.insert(token.clone());
        Json(LoginResponse {
            token,
            username: None,
        })
        .into_response()
    }

    async fn stub_hosts(State(state): State<StubState>, headers: HeaderMap) -> Response {
        if !is_authorized(&state, &headers).await {
            return unauthorized();
        }
        Json(vec!["10.0.0.12", "10.0.0.100", "10.0.0.3"]).into_response()
    }

    async fn stub_list(
        State(state): State<StubState>,
        headers: HeaderMap,
        Query(query): Query<ListQuery>,
    ) -> Response {
        if !is_authorized(&state, &headers).await {
            return unauthorized();
        }

        let hosts: Vec<HostInfo> = ["10.0.0.100", "10.0.0.3", "10.0.0.12"]
            .into_iter()
            .filter(|host| query.host.as_deref().is_none_or(|wanted| wanted == *host))
            .map(|host| HostInfo {
                host: host.to_string(),
                miner_info_list: ["cXacc10", "cXacc2", "cXacc1"]
                    .into_iter()
                    .map(|acc| {
                        let mut miner = MinerInfo {
                            signature_acc: acc.to_string(),
                            ..MinerInfo::default()
                        };
                        let status = if acc == "cXacc2" { "Frozen" } else { "Positive" };
                        miner.stat.status = status.to_string();
                        miner
                    })
                    .collect(),
            })
            .collect();
        Json(hosts).into_response()
    }

    async fn stub_get_config(State(state): State<StubState>, headers: HeaderMap) -> Response {
        if !is_authorized(&state, &headers).await {
            return unauthorized();
        }
        Json(state.config.lock().await.clone()).into_response()
    }

    async fn stub_set_config(
        State(state): State<StubState>,
        headers: HeaderMap,
        Json(config): Json<WatchdogConfig>,
    ) -> Response {
        if !is_authorized(&state, &headers).await {
            return unauthorized();
        }
        state.config_posts.fetch_add(1, Ordering::SeqCst);
        *state.config.lock().await = config;
        Json(serde_json::json!({ "message": "update Watchdog config success" })).into_response()
    }

    async fn run_cli(args: &[&str]) -> Result<String> {
        let output = cli_output(args, None).await?;
        if !output.status.success() {
            bail!(
                "cli-client failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_cli_with_stdin(args: &[&str], input: &str) -> Result<String> {
        let output = cli_output(args, Some(input)).await?;
        if !output.status.success() {
            bail!(
                "cli-client failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn cli_output(args: &[&str], input: Option<&str>) -> Result<Output> {
        let mut child = Command::new(cli_binary()?)
            .args(args)
            .env_remove("WATCHDOG_API_URL")
            .env_remove("WATCHDOG_TOKEN")
            .env_remove("WATCHDOG_USERNAME")
            .env_remove("WATCHDOG_PASSWORD")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("failed to spawn cli-client")?;

        let mut stdin = child.stdin.take().context("cli-client stdin unavailable")?;
        if let Some(input) = input {
            stdin.write_all(input.as_bytes()).await?;
        }
        drop(stdin);

        child
            .wait_with_output()
            .await
            .context("failed to wait for cli-client")
    }

    fn write_config_file(name: &str, config: &serde_json::Value) -> Result<PathBuf> {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!("watchdog-{name}-{unique}.json"));
        fs::write(&path, serde_json::to_vec_pretty(config)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Builds `cli-client` once per test run and returns the binary path.
    fn cli_binary() -> Result<PathBuf> {
        static BUILD: OnceLock<std::result::Result<PathBuf, String>> = OnceLock::new();

        let result = BUILD.get_or_init(|| {
            let workspace_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("../..")
                .canonicalize()
                .map_err(|err| format!("failed to resolve workspace root: {err}"))?;

            let status = std::process::Command::new("cargo")
                .args(["build", "-p", "cli-client"])
                .current_dir(&workspace_root)
                .status()
                .map_err(|err| format!("failed to run cargo build: {err}"))?;
            if !status.success() {
                return Err("cargo build -p cli-client failed".to_string());
            }

            let path = workspace_root
                .join("target")
                .join("debug")
                .join(format!("cli-client{}", std::env::consts::EXE_SUFFIX));
            if path.exists() {
                Ok(path)
            } else {
                Err(format!("expected binary does not exist: {}", path.display()))
            }
        });

        result.clone().map_err(|message| anyhow!(message))
    }
}
