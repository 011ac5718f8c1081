//! Stream definitions for user lifecycle events.

use stream_worker::StreamDef;

/// User events stream definition.
///
/// Written by the user service after each committed create/delete, read by
/// the notification worker.
pub struct UserEventStream;

impl StreamDef for UserEventStream {
    const STREAM_NAME: &'static str = "user-events";

    const CONSUMER_GROUP: &'static str = "notification-group";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_event_stream_def() {
        assert_eq!(UserEventStream::stream_name(), "user-events");
        assert_eq!(UserEventStream::consumer_group(), "notification-group");
        assert_eq!(UserEventStream::MAX_LENGTH, 100_000);
    }
}
