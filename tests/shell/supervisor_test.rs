use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::timeout;

use prism::bus::{LineBus, LineRecord};
use prism::config::ShellConfig;
use prism::event::{EventClassifier, EventKind, EventPayload, EventPipeline, EventSink};
use prism::shell::{
    LineHandler, RunState, ShellError, ShellSupervisor, MAX_COMMAND_LEN, TERMINATION_SENTINEL,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Recorder {
    lines: Mutex<Vec<String>>,
}

#[async_trait]
impl LineHandler for Recorder {
    fn name(&self) -> &'static str {
        "recorder"
    }

    async fn on_line(&self, line: &LineRecord) {
        self.lines.lock().push(line.text().to_string());
    }
}

fn supervisor(start_cmd: &str) -> Arc<ShellSupervisor> {
    let config = ShellConfig {
        start_cmd: start_cmd.to_string(),
        echo_output: false,
        ..ShellConfig::default()
    };
    ShellSupervisor::new(config, Arc::new(LineBus::new())).unwrap()
}

async fn wait_for_lines(recorder: &Recorder, count: usize) {
    timeout(TIMEOUT, async {
        while recorder.lines.lock().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

fn spawn_dispatch(shell: &Arc<ShellSupervisor>) -> tokio::task::JoinHandle<()> {
    let shell = Arc::clone(shell);
    tokio::spawn(async move { shell.dispatch_lines().await })
}

#[tokio::test]
async fn test_natural_exit_flips_run_flag() {
    let shell = supervisor("echo hello");
    let recorder = Arc::new(Recorder::default());
    shell.add_line_handler(recorder.clone());
    let dispatch = spawn_dispatch(&shell);

    shell.start().await.unwrap();
    timeout(TIMEOUT, shell.wait_stopped()).await.unwrap();

    assert_eq!(shell.state(), RunState::Stopped);
    wait_for_lines(&recorder, 2).await;
    assert_eq!(*recorder.lines.lock(), vec!["hello", TERMINATION_SENTINEL]);

    // The sentinel handler already released the process.
    assert!(!shell.kill().await.unwrap());
    assert!(matches!(
        shell.send_command("list").await,
        Err(ShellError::NotRunning)
    ));

    dispatch.abort();
}

#[tokio::test]
async fn test_exit_status_does_not_hide_sentinel() {
    let shell = supervisor("echo crashing && false");
    let dispatch = spawn_dispatch(&shell);

    shell.start().await.unwrap();
    timeout(TIMEOUT, shell.wait_stopped()).await.unwrap();
    assert!(!shell.is_running());

    dispatch.abort();
}

#[tokio::test]
async fn test_restart_after_exit() {
    let shell = supervisor("echo once");
    let dispatch = spawn_dispatch(&shell);

    shell.start().await.unwrap();
    timeout(TIMEOUT, shell.wait_stopped()).await.unwrap();

    shell.start().await.unwrap();
    timeout(TIMEOUT, shell.wait_stopped()).await.unwrap();

    dispatch.abort();
}

#[tokio::test]
async fn test_probe_reads_command_response() {
    let shell = supervisor("cat");
    let recorder = Arc::new(Recorder::default());
    shell.add_line_handler(recorder.clone());
    let dispatch = spawn_dispatch(&shell);

    shell.start().await.unwrap();
    let lines = shell
        .probe("ping", Duration::from_millis(300), 3)
        .await
        .unwrap();
    assert_eq!(lines, vec!["ping"]);

    // The drain still classifies what the probe read.
    wait_for_lines(&recorder, 1).await;
    assert_eq!(*recorder.lines.lock(), vec!["ping"]);

    assert!(shell.kill().await.unwrap());
    dispatch.abort();
}

#[tokio::test]
async fn test_concurrent_probes_are_not_interleaved() {
    let shell = supervisor("cat");
    let dispatch = spawn_dispatch(&shell);
    shell.start().await.unwrap();

    let wait = Duration::from_millis(300);
    let (first, second) = tokio::join!(shell.probe("alpha", wait, 5), shell.probe("beta", wait, 5));

    let mut responses = vec![first.unwrap(), second.unwrap()];
    responses.sort();
    assert_eq!(responses, vec![vec!["alpha".to_string()], vec!["beta".to_string()]]);

    shell.kill().await.unwrap();
    dispatch.abort();
}

#[tokio::test]
async fn test_embedded_newline_never_reaches_game() {
    let shell = supervisor("cat");
    let recorder = Arc::new(Recorder::default());
    shell.add_line_handler(recorder.clone());
    let dispatch = spawn_dispatch(&shell);
    shell.start().await.unwrap();

    let result = shell.probe("say hi\nstop", Duration::from_millis(300), 5).await;
    assert!(matches!(result, Err(ShellError::InvalidCommand(_))));

    let lines = shell
        .probe("say hi", Duration::from_millis(300), 5)
        .await
        .unwrap();
    assert_eq!(lines, vec!["say hi"]);
    wait_for_lines(&recorder, 1).await;
    assert_eq!(*recorder.lines.lock(), vec!["say hi"]);

    shell.kill().await.unwrap();
    dispatch.abort();
}

#[tokio::test]
async fn test_kill_is_not_blocked_by_pending_write() {
    // `sleep` never reads stdin, so the pipe fills and writes stall.
    let shell = supervisor("sleep 30");
    shell.start().await.unwrap();

    let writer = {
        let shell = Arc::clone(&shell);
        tokio::spawn(async move {
            let command = "x".repeat(MAX_COMMAND_LEN);
            loop {
                if let Err(e) = shell.send_command(&command).await {
                    return e;
                }
            }
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;

    let killed = timeout(Duration::from_secs(3), shell.kill())
        .await
        .expect("kill should not wait for the stalled write")
        .unwrap();
    assert!(killed);
    assert_eq!(shell.state(), RunState::Stopped);

    let err = timeout(Duration::from_secs(10), writer).await.unwrap().unwrap();
    assert!(!matches!(err, ShellError::InvalidCommand(_)));
}

#[tokio::test]
async fn test_kill_running_process() {
    let shell = supervisor("sleep 30");
    shell.start().await.unwrap();
    assert!(shell.pid().await.is_some());

    let killed = timeout(TIMEOUT, shell.kill()).await.unwrap().unwrap();
    assert!(killed);
    assert_eq!(shell.state(), RunState::Stopped);
    assert!(shell.pid().await.is_none());
    assert!(!shell.kill().await.unwrap());
}

#[tokio::test]
async fn test_stop_sends_stop_command() {
    // `read` consumes one line, then the wrapper exits.
    let config = ShellConfig {
        start_cmd: "read line; echo \"got $line\"".to_string(),
        stop_cmd: "halt".to_string(),
        echo_output: false,
        ..ShellConfig::default()
    };
    let shell = ShellSupervisor::new(config, Arc::new(LineBus::new())).unwrap();
    let recorder = Arc::new(Recorder::default());
    shell.add_line_handler(recorder.clone());
    let dispatch = spawn_dispatch(&shell);

    shell.start().await.unwrap();
    shell.stop().await.unwrap();
    timeout(TIMEOUT, shell.wait_stopped()).await.unwrap();

    assert_eq!(recorder.lines.lock()[0], "got halt");
    dispatch.abort();
}

#[tokio::test]
async fn test_output_becomes_events() {
    let shell = supervisor(
        "echo '[12:00:00] [Server thread/INFO]: Done (1.5s)! For help, type \"help\"'",
    );
    let sink = Arc::new(EventSink::new());
    let mut events = sink.subscribe();
    shell.add_line_handler(Arc::new(EventPipeline::new(
        EventClassifier::new(TERMINATION_SENTINEL).unwrap(),
        Arc::clone(&sink),
    )));
    let dispatch = spawn_dispatch(&shell);

    shell.start().await.unwrap();

    let start = timeout(TIMEOUT, events.next_event()).await.unwrap().unwrap();
    assert_eq!(start.payload, EventPayload::ServerStart { start_use_time: 1.5 });
    let stop = timeout(TIMEOUT, events.next_event()).await.unwrap().unwrap();
    assert_eq!(stop.kind(), EventKind::ServerStop);

    timeout(TIMEOUT, shell.wait_stopped()).await.unwrap();
    dispatch.abort();
}
