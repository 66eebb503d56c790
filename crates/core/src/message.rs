// Message envelope posted from client threads to the internal thread

use crate::protocol::{reply_channel, ReplyWaiter, Responder};
use crate::state::Operation;
use crate::status::{PlayerResult, StatusCode};

/// Identifier of a player, unique per process
pub type PlayerId = u64;

/// Requested operation with its by-value arguments
#[derive(Debug)]
pub enum Request {
    SetDataSourcePath(String),
    SetDataSourceUri(String),
    SetDataSourceFd(i32),
    SetDataSourceFdRange { fd: i32, offset: i64, length: i64 },
    /// Synchronous prepare; `completion` receives the outcome of preparation
    Prepare { completion: Responder },
    PrepareAsync,
    Start,
    Stop,
    Pause,
    Reset,
    SetVolume { left: f32, right: f32 },
    GetDuration,
    GetCurrentPosition,
    SeekTo { msec: i32 },
    SetLooping(bool),
    IsLooping,
    IsPlaying,
    SetAudioStreamType(i32),
    SetNextMediaPlayer(Option<PlayerId>),
    AttachAuxEffect(i32),
    SetAuxEffectSendLevel(f32),
}

impl Request {
    pub fn operation(&self) -> Operation {
        match self {
            Request::SetDataSourcePath(_) => Operation::SetDataSourcePath,
            Request::SetDataSourceUri(_) => Operation::SetDataSourceUri,
            Request::SetDataSourceFd(_) => Operation::SetDataSourceFd,
            Request::SetDataSourceFdRange { .. } => Operation::SetDataSourceFdRange,
            Request::Prepare { .. } => Operation::Prepare,
            Request::PrepareAsync => Operation::PrepareAsync,
            Request::Start => Operation::Start,
            Request::Stop => Operation::Stop,
            Request::Pause => Operation::Pause,
            Request::Reset => Operation::Reset,
            Request::SetVolume { .. } => Operation::SetVolume,
            Request::GetDuration => Operation::GetDuration,
            Request::GetCurrentPosition => Operation::GetCurrentPosition,
            Request::SeekTo { .. } => Operation::SeekTo,
            Request::SetLooping(_) => Operation::SetLooping,
            Request::IsLooping => Operation::IsLooping,
            Request::IsPlaying => Operation::IsPlaying,
            Request::SetAudioStreamType(_) => Operation::SetAudioStreamType,
            Request::SetNextMediaPlayer(_) => Operation::SetNextMediaPlayer,
            Request::AttachAuxEffect(_) => Operation::AttachAuxEffect,
            Request::SetAuxEffectSendLevel(_) => Operation::SetAuxEffectSendLevel,
        }
    }
}

/// Value carried by a successful reply
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReplyValue {
    Unit,
    Int(i32),
    Bool(bool),
}

/// Result published for a blocking message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub value: ReplyValue,
}

impl Reply {
    pub fn ok() -> Self {
        Self::from_status(StatusCode::Success)
    }

    pub fn from_status(status: StatusCode) -> Self {
        Self {
            status,
            value: ReplyValue::Unit,
        }
    }

    pub fn with_int(value: i32) -> Self {
        Self {
            status: StatusCode::Success,
            value: ReplyValue::Int(value),
        }
    }

    pub fn with_bool(value: bool) -> Self {
        Self {
            status: StatusCode::Success,
            value: ReplyValue::Bool(value),
        }
    }

    pub fn into_result(self) -> PlayerResult<ReplyValue> {
        self.status.into_result().map(|_| self.value)
    }

    pub fn into_int(self) -> PlayerResult<i32> {
        match self.into_result()? {
            ReplyValue::Int(value) => Ok(value),
            _ => Err(StatusCode::InternalError),
        }
    }

    pub fn into_bool(self) -> PlayerResult<bool> {
        match self.into_result()? {
            ReplyValue::Bool(value) => Ok(value),
            _ => Err(StatusCode::InternalError),
        }
    }
}

impl From<PlayerResult> for Reply {
    fn from(result: PlayerResult) -> Self {
        Reply::from_status(StatusCode::from_result(&result))
    }
}

/// A request plus, for blocking posts, the slot its result is published to
#[derive(Debug)]
pub struct Message {
    pub request: Request,
    pub responder: Option<Responder>,
}

impl Message {
    /// Message whose poster will block on the returned waiter
    pub fn blocking(request: Request) -> (Self, ReplyWaiter) {
        let (responder, waiter) = reply_channel();
        (
            Self {
                request,
                responder: Some(responder),
            },
            waiter,
        )
    }

    /// Fire-and-forget message
    pub fn oneway(request: Request) -> Self {
        Self {
            request,
            responder: None,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.responder.is_some()
    }

    /// Publish `reply` to a blocked poster, if any
    pub fn reply(responder: Option<Responder>, reply: Reply) {
        if let Some(responder) = responder {
            responder.respond(reply);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_message_carries_responder() {
        let (message, waiter) = Message::blocking(Request::Start);
        assert!(message.is_blocking());
        assert_eq!(message.request.operation(), Operation::Start);

        Message::reply(message.responder, Reply::with_bool(true));
        assert_eq!(waiter.wait(None).into_bool(), Ok(true));
    }

    #[test]
    fn test_oneway_message() {
        let message = Message::oneway(Request::PrepareAsync);
        assert!(!message.is_blocking());
        assert_eq!(message.request.operation(), Operation::PrepareAsync);
    }

    #[test]
    fn test_reply_conversions() {
        assert_eq!(Reply::with_int(7).into_int(), Ok(7));
        assert_eq!(
            Reply::from_status(StatusCode::IllegalState).into_int(),
            Err(StatusCode::IllegalState)
        );
        assert_eq!(Reply::ok().into_bool(), Err(StatusCode::InternalError));
        assert_eq!(Reply::from(Err(StatusCode::Error)).status, StatusCode::Error);
    }

    #[test]
    fn test_dropping_a_blocking_message_resolves_waiter() {
        let (message, waiter) = Message::blocking(Request::GetDuration);
        drop(message);
        assert_eq!(waiter.wait(None).status, StatusCode::DeadObject);
    }
}
