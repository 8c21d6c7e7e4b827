use spotlink_proto::protocol::{Command, Message};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Length-prefixed JSON connection to the daemon, with frame reassembly.
pub struct DaemonConnection {
    stream: TcpStream,
    read_buffer: Vec<u8>,
}

impl DaemonConnection {
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(address).await?;
        Ok(Self {
            stream,
            read_buffer: Vec::with_capacity(4096),
        })
    }

    pub async fn send_command(&mut self, cmd: Command) -> anyhow::Result<()> {
        let msg = Message::Command(cmd);
        let encoded = msg.encode()?;
        self.stream.write_all(&encoded).await?;
        Ok(())
    }

    /// Read until one complete message is available.
    pub async fn receive(&mut self) -> anyhow::Result<Message> {
        let mut buf = vec![0u8; 4096];

        loop {
            if self.read_buffer.len() >= 4 {
                if let Ok((msg, consumed)) = Message::decode(&self.read_buffer) {
                    self.read_buffer.drain(..consumed);
                    return Ok(msg);
                }
            }

            match self.stream.read(&mut buf).await {
                Ok(0) => anyhow::bail!("daemon closed the connection"),
                Ok(n) => self.read_buffer.extend_from_slice(&buf[..n]),
                Err(e) => anyhow::bail!("read error: {}", e),
            }
        }
    }
}
