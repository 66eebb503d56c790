// C ABI for the media player
// Contexts and players are addressed by integer handles; every call returns a status code.

use mediaplayer_core::status::StatusCode;
use mediaplayer_core::{
    ContextOptions, InitializeArgs, MediaPlayer, OnBufferingUpdateListener, OnCompletionListener,
    OnErrorListener, OnInfoListener, OnPreparedListener, OnSeekCompleteListener, PlayerContext,
    PlayerId, PlayerResult, PlayerState,
};
use mediaplayer_engine_symphonia::SymphoniaEngineFactory;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::{c_void, CStr};
use std::os::raw::c_char;
use std::sync::{Arc, Once};

pub const MEDIAPLAYER_EVENT_PREPARED: i32 = 1;
pub const MEDIAPLAYER_EVENT_COMPLETION: i32 = 2;
pub const MEDIAPLAYER_EVENT_BUFFERING_UPDATE: i32 = 3;
pub const MEDIAPLAYER_EVENT_SEEK_COMPLETE: i32 = 4;
pub const MEDIAPLAYER_EVENT_INFO: i32 = 5;
pub const MEDIAPLAYER_EVENT_ERROR: i32 = 6;

/// Event callback: `(user_data, player_id, event, arg1, arg2) -> handled`.
///
/// `arg1` is the percentage for buffering updates and `what` for info/error
/// events, `arg2` is `extra`. The return value is only used for info and
/// error events. Runs on the internal thread, so it must not block and must
/// not call blocking player functions.
pub type MediaPlayerEventCallback =
    extern "C" fn(user_data: *mut c_void, player_id: i64, event: i32, arg1: i32, arg2: i32) -> bool;

struct UserData(*mut c_void);

// SAFETY: the pointer is only handed back to the caller's callback; the
// caller guarantees it is usable from the internal thread
unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

/// Forwards every listener category to one C callback
struct CallbackAdapter {
    handle: i64,
    callback: MediaPlayerEventCallback,
    user_data: UserData,
}

impl CallbackAdapter {
    fn emit(&self, event: i32, arg1: i32, arg2: i32) -> bool {
        (self.callback)(self.user_data.0, self.handle, event, arg1, arg2)
    }
}

impl OnPreparedListener for CallbackAdapter {
    fn on_prepared(&self, _player: PlayerId) {
        self.emit(MEDIAPLAYER_EVENT_PREPARED, 0, 0);
    }
}

impl OnCompletionListener for CallbackAdapter {
    fn on_completion(&self, _player: PlayerId) {
        self.emit(MEDIAPLAYER_EVENT_COMPLETION, 0, 0);
    }
}

impl OnBufferingUpdateListener for CallbackAdapter {
    fn on_buffering_update(&self, _player: PlayerId, percent: i32) {
        self.emit(MEDIAPLAYER_EVENT_BUFFERING_UPDATE, percent, 0);
    }
}

impl OnSeekCompleteListener for CallbackAdapter {
    fn on_seek_complete(&self, _player: PlayerId) {
        self.emit(MEDIAPLAYER_EVENT_SEEK_COMPLETE, 0, 0);
    }
}

impl OnInfoListener for CallbackAdapter {
    fn on_info(&self, _player: PlayerId, what: i32, extra: i32) -> bool {
        self.emit(MEDIAPLAYER_EVENT_INFO, what, extra)
    }
}

impl OnErrorListener for CallbackAdapter {
    fn on_error(&self, _player: PlayerId, what: i32, extra: i32) -> bool {
        self.emit(MEDIAPLAYER_EVENT_ERROR, what, extra)
    }
}

/// A registered player. Listeners are held weakly by the player, so the
/// entry keeps the adapter alive.
struct PlayerEntry {
    player: MediaPlayer,
    callback: Mutex<Option<Arc<CallbackAdapter>>>,
}

static CONTEXT_REGISTRY: Lazy<Mutex<HashMap<i64, Arc<PlayerContext>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static PLAYER_REGISTRY: Lazy<Mutex<HashMap<i64, Arc<PlayerEntry>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_HANDLE: Lazy<Mutex<i64>> = Lazy::new(|| Mutex::new(1));
static INIT_LOGGER: Once = Once::new();

fn init_logging() {
    INIT_LOGGER.call_once(|| {
        #[cfg(target_os = "android")]
        {
            android_logger::init_once(
                android_logger::Config::default()
                    .with_max_level(log::LevelFilter::Debug)
                    .with_tag("MediaPlayer"),
            );
        }

        #[cfg(not(target_os = "android"))]
        {
            let _ = env_logger::builder()
                .filter_level(log::LevelFilter::Info)
                .parse_default_env()
                .try_init();
        }
    });
}

fn next_handle() -> i64 {
    let mut next = NEXT_HANDLE.lock();
    let handle = *next;
    *next += 1;
    handle
}

fn context(handle: i64) -> PlayerResult<Arc<PlayerContext>> {
    CONTEXT_REGISTRY
        .lock()
        .get(&handle)
        .cloned()
        .ok_or(StatusCode::InvalidHandle)
}

/// The registry lock is released before the entry is used
fn player(handle: i64) -> PlayerResult<Arc<PlayerEntry>> {
    PLAYER_REGISTRY
        .lock()
        .get(&handle)
        .cloned()
        .ok_or(StatusCode::InvalidHandle)
}

fn with_player<R>(handle: i64, f: impl FnOnce(&MediaPlayer) -> PlayerResult<R>) -> PlayerResult<R> {
    let entry = player(handle)?;
    f(&entry.player)
}

fn to_code(result: PlayerResult) -> i32 {
    let status = StatusCode::from_result(&result);
    if !status.is_success() {
        log::debug!("FFI call failed: {}", status);
    }
    status.code()
}

fn write_out<T>(out: *mut T, result: PlayerResult<T>) -> i32 {
    if out.is_null() {
        return StatusCode::IllegalArgument.code();
    }
    match result {
        Ok(value) => {
            // SAFETY: non-null, the caller provides a valid writable pointer
            unsafe { out.write(value) };
            StatusCode::Success.code()
        }
        Err(status) => to_code(Err(status)),
    }
}

fn c_str<'a>(ptr: *const c_char) -> PlayerResult<&'a str> {
    if ptr.is_null() {
        return Err(StatusCode::IllegalArgument);
    }
    // SAFETY: non-null, the caller provides a NUL-terminated string valid for the call
    let c_str = unsafe { CStr::from_ptr(ptr) };
    c_str.to_str().map_err(|_| StatusCode::IllegalArgument)
}

fn state_code(state: PlayerState) -> i32 {
    PlayerState::ALL
        .iter()
        .position(|s| *s == state)
        .map(|i| i as i32)
        .unwrap_or(-1)
}

// -------------------------------
// Contexts
// -------------------------------

/// Create a player context with its own internal thread
#[no_mangle]
pub extern "C" fn mediaplayer_context_create(out_id: *mut i64) -> i32 {
    init_logging();
    if out_id.is_null() {
        return StatusCode::IllegalArgument.code();
    }

    let built = PlayerContext::builder()
        .engine_factory(Arc::new(SymphoniaEngineFactory::new()))
        .options(ContextOptions::from_env())
        .build();

    let result = match built {
        Ok(context) => {
            let handle = next_handle();
            CONTEXT_REGISTRY.lock().insert(handle, context);
            log::info!("Context {} created", handle);
            Ok(handle)
        }
        Err(e) => {
            log::error!("Failed to create context: {}", e);
            Err(StatusCode::from(&e))
        }
    };
    write_out(out_id, result)
}

/// Drop the handle. The context shuts down once its last player is released.
#[no_mangle]
pub extern "C" fn mediaplayer_context_release(context_id: i64) -> i32 {
    let removed = CONTEXT_REGISTRY.lock().remove(&context_id);
    match removed {
        Some(_) => {
            log::info!("Context {} released", context_id);
            StatusCode::Success.code()
        }
        None => StatusCode::InvalidHandle.code(),
    }
}

// -------------------------------
// Player lifecycle
// -------------------------------

#[no_mangle]
pub extern "C" fn mediaplayer_create(context_id: i64, out_id: *mut i64) -> i32 {
    init_logging();
    if out_id.is_null() {
        return StatusCode::IllegalArgument.code();
    }

    let result = context(context_id).map(|context| {
        let handle = next_handle();
        let entry = PlayerEntry {
            player: MediaPlayer::new(&context),
            callback: Mutex::new(None),
        };
        PLAYER_REGISTRY.lock().insert(handle, Arc::new(entry));
        handle
    });
    write_out(out_id, result)
}

#[no_mangle]
pub extern "C" fn mediaplayer_initialize(player_id: i64, use_fade: bool) -> i32 {
    to_code(with_player(player_id, |p| p.initialize(InitializeArgs { use_fade })))
}

/// Release the player and invalidate its handle
#[no_mangle]
pub extern "C" fn mediaplayer_release(player_id: i64) -> i32 {
    let removed = PLAYER_REGISTRY.lock().remove(&player_id);
    match removed {
        Some(entry) => to_code(entry.player.release()),
        None => StatusCode::InvalidHandle.code(),
    }
}

#[no_mangle]
pub extern "C" fn mediaplayer_get_state(player_id: i64, out_state: *mut i32) -> i32 {
    write_out(out_state, with_player(player_id, |p| Ok(state_code(p.state()))))
}

// -------------------------------
// Data sources
// -------------------------------

#[no_mangle]
pub extern "C" fn mediaplayer_set_data_source_path(player_id: i64, path: *const c_char) -> i32 {
    to_code(c_str(path).and_then(|path| with_player(player_id, |p| p.set_data_source_path(path))))
}

#[no_mangle]
pub extern "C" fn mediaplayer_set_data_source_uri(player_id: i64, uri: *const c_char) -> i32 {
    to_code(c_str(uri).and_then(|uri| with_player(player_id, |p| p.set_data_source_uri(uri))))
}

/// The descriptor stays owned by the caller
#[no_mangle]
pub extern "C" fn mediaplayer_set_data_source_fd(player_id: i64, fd: i32) -> i32 {
    to_code(with_player(player_id, |p| p.set_data_source_fd(fd)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_set_data_source_fd_range(
    player_id: i64,
    fd: i32,
    offset: i64,
    length: i64,
) -> i32 {
    to_code(with_player(player_id, |p| p.set_data_source_fd_range(fd, offset, length)))
}

// -------------------------------
// Playback control
// -------------------------------

#[no_mangle]
pub extern "C" fn mediaplayer_prepare(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.prepare()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_prepare_async(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.prepare_async()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_start(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.start()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_stop(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.stop()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_pause(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.pause()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_reset(player_id: i64) -> i32 {
    to_code(with_player(player_id, |p| p.reset()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_set_volume(player_id: i64, left: f32, right: f32) -> i32 {
    to_code(with_player(player_id, |p| p.set_volume(left, right)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_get_duration(player_id: i64, out_msec: *mut i32) -> i32 {
    write_out(out_msec, with_player(player_id, |p| p.duration()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_get_current_position(player_id: i64, out_msec: *mut i32) -> i32 {
    write_out(out_msec, with_player(player_id, |p| p.current_position()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_seek_to(player_id: i64, msec: i32) -> i32 {
    to_code(with_player(player_id, |p| p.seek_to(msec)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_set_looping(player_id: i64, looping: bool) -> i32 {
    to_code(with_player(player_id, |p| p.set_looping(looping)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_is_looping(player_id: i64, out_looping: *mut bool) -> i32 {
    write_out(out_looping, with_player(player_id, |p| p.is_looping()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_is_playing(player_id: i64, out_playing: *mut bool) -> i32 {
    write_out(out_playing, with_player(player_id, |p| p.is_playing()))
}

#[no_mangle]
pub extern "C" fn mediaplayer_set_audio_stream_type(player_id: i64, stream_type: i32) -> i32 {
    to_code(with_player(player_id, |p| p.set_audio_stream_type(stream_type)))
}

/// `next_id == 0` clears the next player
#[no_mangle]
pub extern "C" fn mediaplayer_set_next_media_player(player_id: i64, next_id: i64) -> i32 {
    let result = player(player_id).and_then(|entry| {
        if next_id == 0 {
            return entry.player.set_next_media_player(None);
        }
        let next = player(next_id).map_err(|_| StatusCode::IllegalArgument)?;
        entry.player.set_next_media_player(Some(&next.player))
    });
    to_code(result)
}

#[no_mangle]
pub extern "C" fn mediaplayer_attach_aux_effect(player_id: i64, effect_id: i32) -> i32 {
    to_code(with_player(player_id, |p| p.attach_aux_effect(effect_id)))
}

#[no_mangle]
pub extern "C" fn mediaplayer_set_aux_effect_send_level(player_id: i64, level: f32) -> i32 {
    to_code(with_player(player_id, |p| p.set_aux_effect_send_level(level)))
}

// -------------------------------
// Events
// -------------------------------

/// Route every event of the player to `callback`; a null callback clears it
#[no_mangle]
pub extern "C" fn mediaplayer_set_event_callback(
    player_id: i64,
    callback: Option<MediaPlayerEventCallback>,
    user_data: *mut c_void,
) -> i32 {
    let entry = match player(player_id) {
        Ok(entry) => entry,
        Err(status) => return status.code(),
    };

    let adapter = callback.map(|callback| {
        Arc::new(CallbackAdapter {
            handle: player_id,
            callback,
            user_data: UserData(user_data),
        })
    });

    let result = set_listeners(&entry.player, adapter.as_ref());
    if result.is_ok() {
        let previous = std::mem::replace(&mut *entry.callback.lock(), adapter);
        if previous.is_some() {
            log::debug!("Player {} event callback replaced", player_id);
        }
    }
    to_code(result)
}

fn set_listeners(player: &MediaPlayer, adapter: Option<&Arc<CallbackAdapter>>) -> PlayerResult {
    let prepared = adapter.map(|a| a.clone() as Arc<dyn OnPreparedListener>);
    let completion = adapter.map(|a| a.clone() as Arc<dyn OnCompletionListener>);
    let buffering = adapter.map(|a| a.clone() as Arc<dyn OnBufferingUpdateListener>);
    let seek = adapter.map(|a| a.clone() as Arc<dyn OnSeekCompleteListener>);
    let info = adapter.map(|a| a.clone() as Arc<dyn OnInfoListener>);
    let error = adapter.map(|a| a.clone() as Arc<dyn OnErrorListener>);

    player.set_on_prepared_listener(prepared.as_ref())?;
    player.set_on_completion_listener(completion.as_ref())?;
    player.set_on_buffering_update_listener(buffering.as_ref())?;
    player.set_on_seek_complete_listener(seek.as_ref())?;
    player.set_on_info_listener(info.as_ref())?;
    player.set_on_error_listener(error.as_ref())
}
