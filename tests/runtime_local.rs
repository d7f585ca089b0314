// ABOUTME: Integration tests against the local Docker or Podman engine.
// ABOUTME: Each test skips itself when no engine answers a ping.

mod support;

use cairn::container::{ContainerBuilder, Orchestrator, StartError};
use cairn::context::Context;
use cairn::modules::{Postgres, Preset, Redis};
use cairn::runtime::{
    BollardRuntime, ContainerConfig, ContainerError, ContainerOps, ContainerState, ExecConfig,
    ExecOps, ImageOps, RuntimeInfo, collect_logs, detect_local,
};
use cairn::types::ImageRef;
use cairn::wait::WaitStrategy;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn local_runtime() -> Option<BollardRuntime> {
    let detected = detect_local(None).ok()?;
    let runtime = BollardRuntime::connect(&detected).ok()?;
    runtime.ping().await.ok()?;
    Some(runtime)
}

/// Skip test if no local engine answers.
macro_rules! require_runtime {
    () => {
        match local_runtime().await {
            Some(rt) => rt,
            None => {
                eprintln!("Skipping test: no local container runtime found");
                return;
            }
        }
    };
}

fn orchestrator(runtime: BollardRuntime) -> (Orchestrator, Arc<Context>) {
    support::init_tracing();
    let context = Arc::new(Context::new());
    (
        Orchestrator::with_context(Arc::new(runtime), Arc::clone(&context)),
        context,
    )
}

fn alpine_sleeper() -> ContainerBuilder {
    ContainerBuilder::new("alpine:3").with_command(["sleep", "300"])
}

#[tokio::test]
async fn runtime_info() {
    let runtime = require_runtime!();

    let info = runtime.info().await.expect("should get runtime info");
    assert!(!info.name.is_empty());
    assert!(!info.version.is_empty());
}

#[tokio::test]
async fn pull_public_image() {
    let runtime = require_runtime!();
    let image = ImageRef::parse("alpine:3").unwrap();

    runtime.pull_image(&image, None).await.expect("pull should succeed");
    assert!(runtime.image_exists(&image).await.unwrap());
}

#[tokio::test]
async fn missing_image_reports_not_found() {
    let runtime = require_runtime!();
    let image = ImageRef::parse("cairn-test/definitely-not-pulled:0").unwrap();

    assert!(!runtime.image_exists(&image).await.unwrap());
    let err = runtime
        .create_container(&ContainerConfig::new(image))
        .await
        .unwrap_err();
    assert!(matches!(err, ContainerError::ImageNotFound(_)), "{err}");
}

#[tokio::test]
async fn raw_container_lifecycle() {
    let runtime = require_runtime!();
    let image = ImageRef::parse("alpine:3").unwrap();
    runtime.pull_image(&image, None).await.unwrap();

    let mut config = ContainerConfig::new(image);
    config.command = vec!["sh".into(), "-c".into(), "echo hello; sleep 300".into()];
    let id = runtime.create_container(&config).await.unwrap();

    runtime.start_container(&id).await.unwrap();
    let info = runtime.inspect_container(&id).await.unwrap();
    assert_eq!(info.state, ContainerState::Running);

    let result = runtime
        .exec(&id, &ExecConfig::command(["sh", "-c", "echo out; echo err >&2; exit 3"]))
        .await
        .unwrap();
    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stdout_str(), "out\n");
    assert_eq!(result.stderr_str(), "err\n");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let logs = collect_logs(&runtime, &id).await.unwrap();
    assert!(logs.contains("hello"), "{logs}");

    runtime.stop_container(&id, Duration::from_secs(1)).await.unwrap();
    runtime.remove_container(&id, true).await.unwrap();
    assert!(matches!(
        runtime.inspect_container(&id).await,
        Err(ContainerError::NotFound(_))
    ));
}

#[tokio::test]
async fn redis_preset_accepts_connections() {
    let runtime = require_runtime!();
    let (orch, ctx) = orchestrator(runtime);

    let redis = orch.start(Redis::new().build().unwrap()).await.unwrap();
    let port = redis.mapped_port(6379).await.unwrap();

    let mut stream = TcpStream::connect((redis.host(), port)).await.unwrap();
    stream.write_all(b"PING\r\n").await.unwrap();
    let mut reply = [0u8; 7];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply, b"+PONG\r\n");

    redis.remove().await.unwrap();
    assert!(ctx.registry().is_empty());
}

#[tokio::test]
async fn postgres_preset_is_ready_for_queries() {
    let runtime = require_runtime!();
    let (orch, ctx) = orchestrator(runtime);

    let preset = Postgres::new().with_database("orders");
    let container = orch.start(preset.clone().build().unwrap()).await.unwrap();

    let url = preset.connection_url(&container).await.unwrap();
    assert!(url.starts_with("postgres://test:test@"), "{url}");
    assert!(url.ends_with("/orders"), "{url}");

    let query = container
        .exec(["psql", "-U", "test", "-d", "orders", "-tAc", "select 1"])
        .await
        .unwrap();
    assert!(query.success(), "{}", query.output());
    assert_eq!(query.stdout_str().trim(), "1");

    ctx.cleanup().await;
}

#[tokio::test]
async fn log_wait_timeout_removes_container() {
    let runtime = require_runtime!();
    let (orch, ctx) = orchestrator(runtime);

    let spec = alpine_sleeper()
        .with_wait(WaitStrategy::log("never printed").with_timeout(Duration::from_secs(2)))
        .build()
        .unwrap();
    let err = orch.start(spec).await.unwrap_err();

    assert!(matches!(err, StartError::Wait(ref e) if e.is_timeout()), "{err}");
    assert!(ctx.registry().is_empty());
}

#[tokio::test]
async fn health_check_wait() {
    let runtime = require_runtime!();
    let (orch, ctx) = orchestrator(runtime);

    let spec = alpine_sleeper()
        .with_healthcheck("test -e /etc/alpine-release")
        .with_wait(WaitStrategy::healthy().with_timeout(Duration::from_secs(30)))
        .build()
        .unwrap();
    let container = orch.start(spec).await.unwrap();

    let info = container.inspect().await.unwrap();
    assert_eq!(info.health, Some(cairn::runtime::HealthState::Healthy));
    ctx.cleanup().await;
}

#[tokio::test]
async fn stop_then_start_keeps_the_container() {
    let runtime = require_runtime!();
    let (orch, ctx) = orchestrator(runtime);

    let container = orch
        .start(alpine_sleeper().with_stop_timeout(Duration::from_secs(1)).build().unwrap())
        .await
        .unwrap();

    container.stop().await.unwrap();
    assert_ne!(container.inspect().await.unwrap().state, ContainerState::Running);

    container.start().await.unwrap();
    assert_eq!(container.inspect().await.unwrap().state, ContainerState::Running);
    assert!(!container.address().await.unwrap().is_empty());

    container.remove().await.unwrap();
    assert!(ctx.registry().is_empty());
}
