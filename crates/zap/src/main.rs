use std::{
    io::{self, BufRead},
    process::ExitCode,
    sync::Arc,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use zap_core::{
    app::App,
    config::Config,
    console::Console,
    dispatcher::inbound_logger,
    logging,
    messaging::{bus::EventBus, port::SessionClient},
    scheduler::SystemClock,
    Error, Result,
};
use zap_whatsapp::{WhatsAppClient, WhatsAppConfig};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<()> {
    let cfg = Config::load()?;
    logging::init("zapsender", &cfg.log_level)?;
    info!(session_dir = %cfg.session_dir.display(), "starting");

    std::fs::create_dir_all(&cfg.session_dir).map_err(|source| Error::SessionDir {
        path: cfg.session_dir.clone(),
        source,
    })?;

    let console = Console::stdout();
    let client: Arc<dyn SessionClient> = Arc::new(WhatsAppClient::new(WhatsAppConfig {
        session_dir: cfg.session_dir.clone(),
        pairing_timeout: cfg.pairing_timeout,
    })?);

    let bus = Arc::new(EventBus::new());
    bus.subscribe(inbound_logger(console.clone()));

    console.line("Connecting to WhatsApp...");
    client.connect(bus.clone()).await?;
    console.line("WhatsApp client connected!");

    let cancel = CancellationToken::new();
    tokio::spawn(watch_signals(cancel.clone(), console.clone()));

    let lines = spawn_stdin_reader(console.clone())?;
    App {
        config: cfg,
        client,
        bus,
        console,
        clock: Arc::new(SystemClock),
    }
    .serve(cancel, lines)
    .await;
    Ok(())
}

/// Blocking stdin reads live on their own thread; the runtime only sees a channel.
fn spawn_stdin_reader(console: Console) -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || forward_lines(io::stdin().lock(), &tx, &console))?;
    Ok(rx)
}

/// Forward lines until end of input or the receiver goes away.
///
/// Undecodable bytes become U+FFFD instead of ending the session; only a
/// real read error stops the reader.
fn forward_lines(mut input: impl BufRead, tx: &mpsc::Sender<String>, console: &Console) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("stdin read failed: {e}");
                console.line(format!("Error reading input: {e}"));
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if tx.blocking_send(line.to_string()).is_err() {
            break;
        }
    }
}

async fn watch_signals(cancel: CancellationToken, console: Console) {
    tokio::select! {
      _ = cancel.cancelled() => {}
      _ = shutdown_signal() => {
        console.line("\nInterrupt signal received, shutting down...");
        cancel.cancel();
      }
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
              _ = tokio::signal::ctrl_c() => {}
              _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {e}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(input: &[u8]) -> (Vec<String>, String) {
        let (tx, mut rx) = mpsc::channel(16);
        let (console, out) = Console::buffer();
        forward_lines(Cursor::new(input.to_vec()), &tx, &console);
        drop(tx);
        let mut lines = Vec::new();
        while let Ok(l) = rx.try_recv() {
            lines.push(l);
        }
        (lines, out.contents())
    }

    #[test]
    fn latin1_line_is_decoded_lossily_and_reading_continues() {
        // "enviar 1 ol\xe1" as typed in a Latin-1 terminal.
        let (lines, out) = collect(b"enviar 1 ol\xe1\r\nsair\n");
        assert_eq!(lines, vec!["enviar 1 ol\u{FFFD}".to_string(), "sair".to_string()]);
        assert!(out.is_empty());
    }

    #[test]
    fn last_line_without_newline_is_kept() {
        let (lines, _) = collect(b"listar_monitores\nsair");
        assert_eq!(lines, vec!["listar_monitores", "sair"]);
    }

    struct Broken;

    impl io::Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("tty gone"))
        }
    }

    #[test]
    fn read_error_is_reported() {
        let (tx, mut rx) = mpsc::channel(16);
        let (console, out) = Console::buffer();
        forward_lines(io::BufReader::new(Broken), &tx, &console);
        drop(tx);
        assert!(rx.try_recv().is_err());
        assert!(out.contents().contains("Error reading input: tty gone"));
    }
}
