//! Newline-delimited JSON over TCP: one [`Command`] per inbound line, one
//! [`Reply`] or [`ControllerEvent`] per outbound line.

use crate::command::{Command, Reply};
use crate::daemon::Daemon;
use crate::event::ControllerEvent;
use anyhow::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

pub async fn serve(
    listener: TcpListener,
    daemon: Arc<Daemon>,
    events: broadcast::Sender<ControllerEvent>,
) -> Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        info!("New connection from {}", peer);
        let daemon = daemon.clone();
        let rx = events.subscribe();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, daemon, rx).await {
                warn!("Connection {} failed: {}", peer, e);
            }
            info!("Lost connection from {}", peer);
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    daemon: Arc<Daemon>,
    mut events: broadcast::Receiver<ControllerEvent>,
) -> Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let reply = match serde_json::from_str::<Command>(&line) {
                    Ok(command) => daemon.handle(command),
                    Err(e) => {
                        debug!("Unparsable command {:?}: {}", line, e);
                        Reply::Error { message: format!("Invalid command: {}", e) }
                    }
                };
                write_json(&mut writer, &reply).await?;
            }
            event = events.recv() => match event {
                Ok(event) => write_json(&mut writer, &event).await?,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Client fell behind, {} event(s) dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    Ok(())
}

async fn write_json<T: Serialize>(writer: &mut OwnedWriteHalf, value: &T) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::testing::MemoryStore;
    use crate::config::Configuration;
    use crate::gpio::mock::MockDriver;
    use serde_json::Value;
    use tokio::io::Lines;
    use tokio::net::tcp::OwnedReadHalf;

    async fn next_json(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Value {
        let line = lines.next_line().await.unwrap().unwrap();
        serde_json::from_str(&line).unwrap()
    }

    #[tokio::test]
    async fn test_commands_and_events_over_tcp() {
        let config: Configuration = serde_json::from_str(
            r#"{
                "buttons": { "A": 17 },
                "activeState": 0,
                "actions": [ { "name": "tap", "sequence": [ { "type": "press", "button": "A", "level": 0 } ] } ]
            }"#,
        )
        .unwrap();
        let driver = MockDriver::new();
        let (events, _) = broadcast::channel::<ControllerEvent>(16);
        let (daemon, _edges) = Daemon::new(
            config,
            &driver,
            Box::new(MemoryStore::default()),
            Arc::new(events.clone()),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, Arc::new(daemon), events));

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"{\"command\":\"getConfig\"}\n").await.unwrap();
        let reply = next_json(&mut lines).await;
        assert_eq!(reply["reply"], "config");
        assert_eq!(reply["config"]["buttons"]["A"], 17);

        writer.write_all(b"not json\n").await.unwrap();
        let reply = next_json(&mut lines).await;
        assert_eq!(reply["reply"], "error");

        writer
            .write_all(b"{\"command\":\"execute\",\"actionIndex\":0}\n")
            .await
            .unwrap();
        assert_eq!(next_json(&mut lines).await["reply"], "accepted");
        let event = next_json(&mut lines).await;
        assert_eq!(event["event"], "actionComplete");
        assert_eq!(event["success"], true);
    }
}
