//! Program entry shim.

use std::sync::RwLock;

static ARGV0: RwLock<Option<String>> = RwLock::new(None);

/// Record the program name for [`crate::fs`] and run `main`.
///
/// With the `djgpp` feature this also switches on near-pointer access to conventional memory,
/// which every other service in this crate relies on; failure to do so exits with status 1.
pub fn run_app<F>(args: &[String], main: F) -> i32
where
    F: FnOnce(&[String]) -> i32,
{
    #[cfg(feature = "djgpp")]
    {
        // SAFETY: called once on the main thread before any conventional-memory access.
        if !unsafe { crate::djgpp::nearptr_enable() } {
            tracing::error!("__djgpp_nearptr_enable() failed");
            return 1;
        }
    }

    set_argv0(args.first().cloned());
    main(args)
}

pub fn set_argv0(argv0: Option<String>) {
    match ARGV0.write() {
        Ok(mut slot) => *slot = argv0,
        Err(poisoned) => *poisoned.into_inner() = argv0,
    }
}

pub fn argv0() -> Option<String> {
    match ARGV0.read() {
        Ok(slot) => slot.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_app_records_argv0_and_returns_main_status() {
        let args = vec!["C:\\GAMES\\DOOM.EXE".to_string(), "-warp".to_string()];
        let status = run_app(&args, |a| {
            assert_eq!(a.len(), 2);
            7
        });
        assert_eq!(status, 7);
        assert_eq!(argv0().as_deref(), Some("C:\\GAMES\\DOOM.EXE"));
    }
}
