use crate::session::Session;

/// Level 1 is always open; level N opens once level N-1 is completed.
/// Higher levels the session does not define stay locked.
pub fn is_level_unlocked(level_number: u8, session: &Session) -> bool {
    match level_number {
        0 => false,
        1 => true,
        n => {
            session.level(n).is_some()
                && session.level(n - 1).is_some_and(|prev| prev.completed)
        }
    }
}

/// First unlocked, not yet completed level in ascending order.
pub fn find_next_available_level(session: &Session) -> Option<u8> {
    let mut numbers: Vec<u8> = session.levels.iter().map(|l| l.level_number).collect();
    numbers.sort_unstable();
    numbers.into_iter().find(|&n| {
        is_level_unlocked(n, session) && session.level(n).is_some_and(|l| !l.completed)
    })
}

/// True when every level is completed. A session without levels counts as
/// complete.
pub fn is_session_complete(session: &Session) -> bool {
    session.levels.iter().all(|l| l.completed)
}

pub fn completed_count(session: &Session) -> usize {
    session.levels.iter().filter(|l| l.completed).count()
}

pub fn progress_summary(session: &Session) -> String {
    format!(
        "{}/{} LEVELS COMPLETED",
        completed_count(session),
        session.levels.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(completed: [bool; 3]) -> Session {
        let mut session = Session::new("session-1", "Test", ["CRANE", "SLATE", "AUDIO"]);
        for (level, done) in session.levels.iter_mut().zip(completed) {
            level.completed = done;
        }
        session
    }

    #[test]
    fn two_completed_unlocks_all() {
        let session = session_with([true, true, false]);
        assert!(is_level_unlocked(1, &session));
        assert!(is_level_unlocked(2, &session));
        assert!(is_level_unlocked(3, &session));
        assert_eq!(find_next_available_level(&session), Some(3));
        assert!(!is_session_complete(&session));
        assert_eq!(progress_summary(&session), "2/3 LEVELS COMPLETED");
    }

    #[test]
    fn fresh_session_unlocks_only_first() {
        let session = session_with([false, false, false]);
        assert!(is_level_unlocked(1, &session));
        assert!(!is_level_unlocked(2, &session));
        assert!(!is_level_unlocked(3, &session));
        assert_eq!(find_next_available_level(&session), Some(1));
    }

    #[test]
    fn unlock_depends_only_on_predecessor() {
        // level 2 done without level 1 opens level 3 but not level 2
        let session = session_with([false, true, false]);
        assert!(!is_level_unlocked(2, &session));
        assert!(is_level_unlocked(3, &session));
        assert_eq!(find_next_available_level(&session), Some(1));
    }

    #[test]
    fn undefined_levels_stay_locked() {
        let session = session_with([true, true, true]);
        assert!(!is_level_unlocked(0, &session));
        assert!(!is_level_unlocked(4, &session));
    }

    #[test]
    fn completed_session_has_no_next_level() {
        let session = session_with([true, true, true]);
        assert_eq!(find_next_available_level(&session), None);
        assert!(is_session_complete(&session));
    }

    #[test]
    fn empty_session_is_vacuously_complete() {
        let session = Session {
            session_id: "session-0".into(),
            session_name: "Empty".into(),
            levels: vec![],
        };
        assert!(is_session_complete(&session));
        assert_eq!(find_next_available_level(&session), None);
        assert!(is_level_unlocked(1, &session));
        assert!(!is_level_unlocked(2, &session));
        assert_eq!(progress_summary(&session), "0/0 LEVELS COMPLETED");
    }
}
