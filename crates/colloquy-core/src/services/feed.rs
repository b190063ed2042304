use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::events::StreamEvent;
use crate::models::conversation_model::ConversationModel;

/// A session's ordered live event feed, with the transport erased.
pub type EventFeed = BoxStream<'static, StreamEvent>;

/// Adapt an unbounded channel into an [`EventFeed`]. The transport side
/// keeps the sender and pushes events as they arrive.
pub fn channel_feed() -> (mpsc::UnboundedSender<StreamEvent>, EventFeed) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let feed = Box::pin(async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    });
    (tx, feed)
}

/// Drive a model from a feed until the feed ends or a protocol
/// violation stops the turn.
pub async fn drive(
    model: &mut ConversationModel,
    mut feed: EventFeed,
) -> Result<(), ProtocolError> {
    while let Some(event) = feed.next().await {
        model.handle_event(event)?;
    }
    Ok(())
}
