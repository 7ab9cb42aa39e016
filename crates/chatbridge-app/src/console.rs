use async_trait::async_trait;
use chatbridge_bridge::ChatSink;

/// Chat sink that prints to the local terminal. Stands in for a real chat
/// transport when running the bridge interactively.
pub struct ConsoleSink;

#[async_trait]
impl ChatSink for ConsoleSink {
    async fn send_message(&self, recipient: &str, text: &str) -> anyhow::Result<()> {
        println!("[-> {recipient}] {text}");
        Ok(())
    }
}
