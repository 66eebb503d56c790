// Player state table: legal transitions and permitted operations per state

use std::fmt;
use std::ops::BitOr;

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    /// Constructed, `initialize()` not called yet
    Created,
    /// Initialized, no data source
    Idle,
    /// Data source set
    Initialized,
    /// Blocking `prepare()` in progress
    PreparingSync,
    /// `prepare_async()` in progress
    PreparingAsync,
    /// Ready to start
    Prepared,
    /// Playing
    Started,
    /// Paused
    Paused,
    /// Reached end of stream
    PlaybackCompleted,
    /// Stopped, must be prepared again before starting
    Stopped,
    /// Released
    End,
    /// Failed; only `reset()` or `release()` leave this state
    Error,
}

impl PlayerState {
    pub const ALL: [PlayerState; 12] = [
        PlayerState::Created,
        PlayerState::Idle,
        PlayerState::Initialized,
        PlayerState::PreparingSync,
        PlayerState::PreparingAsync,
        PlayerState::Prepared,
        PlayerState::Started,
        PlayerState::Paused,
        PlayerState::PlaybackCompleted,
        PlayerState::Stopped,
        PlayerState::End,
        PlayerState::Error,
    ];

    fn bit(self) -> u32 {
        1 << (self as u32)
    }

    pub fn name(self) -> &'static str {
        match self {
            PlayerState::Created => "Created",
            PlayerState::Idle => "Idle",
            PlayerState::Initialized => "Initialized",
            PlayerState::PreparingSync => "PreparingSync",
            PlayerState::PreparingAsync => "PreparingAsync",
            PlayerState::Prepared => "Prepared",
            PlayerState::Started => "Started",
            PlayerState::Paused => "Paused",
            PlayerState::PlaybackCompleted => "PlaybackCompleted",
            PlayerState::Stopped => "Stopped",
            PlayerState::End => "End",
            PlayerState::Error => "Error",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of player states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateMask(u32);

impl StateMask {
    pub const EMPTY: StateMask = StateMask(0);

    pub const PREPARING: StateMask =
        StateMask::of(PlayerState::PreparingSync).with(PlayerState::PreparingAsync);

    /// States in which a data source has been prepared
    pub const PREPARED_GROUP: StateMask = StateMask::of(PlayerState::Prepared)
        .with(PlayerState::Started)
        .with(PlayerState::Paused)
        .with(PlayerState::PlaybackCompleted);

    /// Every state between `Idle` and `Stopped`, i.e. alive and not failed
    pub const OPERATIONAL: StateMask = StateMask::of(PlayerState::Idle)
        .with(PlayerState::Initialized)
        .union(StateMask::PREPARING)
        .union(StateMask::PREPARED_GROUP)
        .with(PlayerState::Stopped);

    /// Every state a live (initialized, not released) player can be in
    pub const ANY: StateMask = StateMask::OPERATIONAL.with(PlayerState::Error);

    pub const fn of(state: PlayerState) -> Self {
        StateMask(1 << (state as u32))
    }

    pub const fn with(self, state: PlayerState) -> Self {
        StateMask(self.0 | (1 << (state as u32)))
    }

    pub const fn union(self, other: StateMask) -> Self {
        StateMask(self.0 | other.0)
    }

    pub fn contains(self, state: PlayerState) -> bool {
        self.0 & state.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for StateMask {
    type Output = StateMask;

    fn bitor(self, rhs: StateMask) -> StateMask {
        self.union(rhs)
    }
}

impl BitOr<PlayerState> for StateMask {
    type Output = StateMask;

    fn bitor(self, rhs: PlayerState) -> StateMask {
        self.with(rhs)
    }
}

/// Whether `state` is a member of `mask`
pub fn check_state_mask(state: PlayerState, mask: StateMask) -> bool {
    mask.contains(state)
}

/// Whether the state machine may move from `current` to `next`
pub fn check_state_transition(current: PlayerState, next: PlayerState) -> bool {
    use PlayerState::*;

    let always = StateMask::of(Idle).with(Error).with(End);
    let allowed = match current {
        Created => always,
        Idle => always.with(Initialized),
        Initialized => always | StateMask::PREPARING | Prepared,
        PreparingSync | PreparingAsync => always.with(Prepared),
        Prepared => always.with(Prepared).with(Started).with(Stopped),
        Started => always
            .with(Started)
            .with(Paused)
            .with(Stopped)
            .with(PlaybackCompleted),
        Paused => always
            .with(Paused)
            .with(Started)
            .with(Stopped)
            .with(PlaybackCompleted),
        PlaybackCompleted => always.with(PlaybackCompleted).with(Started).with(Stopped),
        Stopped => always.with(Stopped) | StateMask::PREPARING | Prepared,
        End => StateMask::of(End),
        Error => always,
    };

    check_state_mask(next, allowed)
}

/// Public player operations, used for the permitted-operation table and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SetDataSourcePath,
    SetDataSourceUri,
    SetDataSourceFd,
    SetDataSourceFdRange,
    Prepare,
    PrepareAsync,
    Start,
    Stop,
    Pause,
    Reset,
    SetVolume,
    GetDuration,
    GetCurrentPosition,
    SeekTo,
    SetLooping,
    IsLooping,
    IsPlaying,
    SetAudioStreamType,
    SetNextMediaPlayer,
    AttachAuxEffect,
    SetAuxEffectSendLevel,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::SetDataSourcePath => "set_data_source_path",
            Operation::SetDataSourceUri => "set_data_source_uri",
            Operation::SetDataSourceFd => "set_data_source_fd",
            Operation::SetDataSourceFdRange => "set_data_source_fd_range",
            Operation::Prepare => "prepare",
            Operation::PrepareAsync => "prepare_async",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Pause => "pause",
            Operation::Reset => "reset",
            Operation::SetVolume => "set_volume",
            Operation::GetDuration => "get_duration",
            Operation::GetCurrentPosition => "get_current_position",
            Operation::SeekTo => "seek_to",
            Operation::SetLooping => "set_looping",
            Operation::IsLooping => "is_looping",
            Operation::IsPlaying => "is_playing",
            Operation::SetAudioStreamType => "set_audio_stream_type",
            Operation::SetNextMediaPlayer => "set_next_media_player",
            Operation::AttachAuxEffect => "attach_aux_effect",
            Operation::SetAuxEffectSendLevel => "set_aux_effect_send_level",
        }
    }

    /// States in which the operation is legal
    pub fn allowed_states(self) -> StateMask {
        use PlayerState::*;

        match self {
            Operation::SetDataSourcePath
            | Operation::SetDataSourceUri
            | Operation::SetDataSourceFd
            | Operation::SetDataSourceFdRange => StateMask::of(Idle),
            Operation::Prepare | Operation::PrepareAsync => {
                StateMask::of(Initialized).with(Stopped)
            }
            Operation::Start => StateMask::PREPARED_GROUP,
            Operation::Stop => StateMask::PREPARED_GROUP.with(Stopped),
            Operation::Pause => StateMask::of(Started).with(Paused).with(PlaybackCompleted),
            Operation::Reset => StateMask::ANY,
            Operation::SetVolume | Operation::SetLooping | Operation::IsPlaying => {
                StateMask::OPERATIONAL
            }
            Operation::GetDuration => StateMask::PREPARED_GROUP.with(Stopped).with(Error),
            Operation::GetCurrentPosition => StateMask::of(Idle)
                .with(Initialized)
                .union(StateMask::PREPARED_GROUP)
                .with(Stopped),
            Operation::SeekTo => StateMask::PREPARED_GROUP,
            Operation::IsLooping => StateMask::ANY,
            Operation::SetAudioStreamType => StateMask::of(Idle).with(Initialized).with(Stopped),
            Operation::SetNextMediaPlayer | Operation::AttachAuxEffect => StateMask::of(Initialized)
                .union(StateMask::PREPARING)
                .union(StateMask::PREPARED_GROUP)
                .with(Stopped),
            Operation::SetAuxEffectSendLevel => StateMask::OPERATIONAL.with(Error),
        }
    }

    /// Whether an engine failure of this operation, issued in `state`, moves
    /// the player to `Error`
    pub fn failure_is_fatal(self, state: PlayerState) -> bool {
        let after_start = StateMask::of(PlayerState::Started)
            .with(PlayerState::Paused)
            .with(PlayerState::Stopped)
            .with(PlayerState::PlaybackCompleted);

        match self {
            Operation::PrepareAsync
            | Operation::Start
            | Operation::Stop
            | Operation::Pause
            | Operation::Reset
            | Operation::GetDuration
            | Operation::GetCurrentPosition
            | Operation::SeekTo
            | Operation::IsPlaying => true,
            Operation::SetLooping => !StateMask::PREPARING.contains(state),
            Operation::AttachAuxEffect | Operation::SetAuxEffectSendLevel => {
                after_start.contains(state)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PlayerState::*;

    fn allowed(op: Operation) -> Vec<PlayerState> {
        PlayerState::ALL
            .iter()
            .copied()
            .filter(|s| check_state_mask(*s, op.allowed_states()))
            .collect()
    }

    #[test]
    fn test_operation_table() {
        assert_eq!(allowed(Operation::SetDataSourcePath), vec![Idle]);
        assert_eq!(allowed(Operation::Prepare), vec![Initialized, Stopped]);
        assert_eq!(allowed(Operation::PrepareAsync), vec![Initialized, Stopped]);
        assert_eq!(
            allowed(Operation::Start),
            vec![Prepared, Started, Paused, PlaybackCompleted]
        );
        assert_eq!(
            allowed(Operation::Stop),
            vec![Prepared, Started, Paused, PlaybackCompleted, Stopped]
        );
        assert_eq!(allowed(Operation::Pause), vec![Started, Paused, PlaybackCompleted]);
        assert_eq!(
            allowed(Operation::SeekTo),
            vec![Prepared, Started, Paused, PlaybackCompleted]
        );
        assert_eq!(
            allowed(Operation::GetDuration),
            vec![Prepared, Started, Paused, PlaybackCompleted, Stopped, Error]
        );
        assert_eq!(
            allowed(Operation::SetAudioStreamType),
            vec![Idle, Initialized, Stopped]
        );
    }

    #[test]
    fn test_no_operation_is_legal_before_initialize_or_after_release() {
        let ops = [
            Operation::SetDataSourcePath,
            Operation::Prepare,
            Operation::Start,
            Operation::Stop,
            Operation::Pause,
            Operation::Reset,
            Operation::SetVolume,
            Operation::GetDuration,
            Operation::GetCurrentPosition,
            Operation::SeekTo,
            Operation::IsLooping,
            Operation::SetAuxEffectSendLevel,
        ];
        for op in ops {
            assert!(!check_state_mask(Created, op.allowed_states()), "{op} in Created");
            assert!(!check_state_mask(End, op.allowed_states()), "{op} in End");
        }
    }

    #[test]
    fn test_error_only_allows_recovery_and_queries() {
        let legal: Vec<Operation> = [
            Operation::Start,
            Operation::Stop,
            Operation::Pause,
            Operation::Reset,
            Operation::SeekTo,
            Operation::Prepare,
            Operation::GetDuration,
            Operation::IsLooping,
            Operation::SetAuxEffectSendLevel,
        ]
        .into_iter()
        .filter(|op| check_state_mask(Error, op.allowed_states()))
        .collect();

        assert_eq!(
            legal,
            vec![
                Operation::Reset,
                Operation::GetDuration,
                Operation::IsLooping,
                Operation::SetAuxEffectSendLevel
            ]
        );
    }

    #[test]
    fn test_transitions() {
        assert!(check_state_transition(Created, Idle));
        assert!(!check_state_transition(Created, Initialized));
        assert!(check_state_transition(Idle, Initialized));
        assert!(check_state_transition(Initialized, PreparingSync));
        assert!(check_state_transition(PreparingAsync, Prepared));
        assert!(check_state_transition(Prepared, Started));
        assert!(!check_state_transition(Prepared, Paused));
        assert!(check_state_transition(Started, PlaybackCompleted));
        assert!(check_state_transition(Paused, PlaybackCompleted));
        assert!(check_state_transition(Stopped, PreparingSync));
        assert!(!check_state_transition(Stopped, Started));
    }

    #[test]
    fn test_self_transitions_where_idempotent() {
        assert!(check_state_transition(Stopped, Stopped));
        assert!(check_state_transition(Started, Started));
        assert!(check_state_transition(Paused, Paused));
        assert!(check_state_transition(Idle, Idle));
    }

    #[test]
    fn test_error_is_absorbing_until_reset() {
        for next in PlayerState::ALL {
            let ok = check_state_transition(Error, next);
            assert_eq!(ok, matches!(next, Idle | Error | End), "Error -> {next}");
        }
    }

    #[test]
    fn test_end_is_terminal() {
        for next in PlayerState::ALL {
            assert_eq!(check_state_transition(End, next), next == End);
        }
    }

    #[test]
    fn test_every_state_can_fail_or_reset() {
        for state in PlayerState::ALL {
            if state == End {
                continue;
            }
            assert!(check_state_transition(state, Error));
            assert!(check_state_transition(state, Idle));
        }
    }

    #[test]
    fn test_legal_operations_lead_to_legal_transitions() {
        let targets = [
            (Operation::Start, Started),
            (Operation::Stop, Stopped),
            (Operation::Prepare, PreparingSync),
            (Operation::PrepareAsync, PreparingAsync),
            (Operation::Reset, Idle),
            (Operation::SetDataSourcePath, Initialized),
        ];
        for (op, target) in targets {
            for state in PlayerState::ALL {
                if check_state_mask(state, op.allowed_states()) {
                    assert!(
                        check_state_transition(state, target),
                        "{op} allowed in {state} but {state} -> {target} is illegal"
                    );
                }
            }
        }
        for state in PlayerState::ALL {
            if check_state_mask(state, Operation::Pause.allowed_states()) {
                let target = if state == PlaybackCompleted { PlaybackCompleted } else { Paused };
                assert!(check_state_transition(state, target));
            }
        }
    }

    #[test]
    fn test_fatal_failures() {
        assert!(Operation::Start.failure_is_fatal(Prepared));
        assert!(!Operation::SetVolume.failure_is_fatal(Started));
        assert!(!Operation::SetLooping.failure_is_fatal(PreparingAsync));
        assert!(Operation::SetLooping.failure_is_fatal(Started));
        assert!(!Operation::AttachAuxEffect.failure_is_fatal(Prepared));
        assert!(Operation::AttachAuxEffect.failure_is_fatal(Paused));
        assert!(!Operation::SetDataSourcePath.failure_is_fatal(Idle));
    }
}
