//! Runtime symbol resolution for the notcurses core library.
//!
//! Every backend instance shares one [`SymbolLoader`]. The first [`SymbolLoader::load`] opens the
//! library and resolves the whole table; later calls only bump a reference count, and the library
//! is closed again when the last [`LoadedSymbols`] is dropped. A table is all or nothing: if any
//! symbol is missing the library is closed and loading fails.

use std::ffi::c_void;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::ffi;
use crate::{NotcursesError, Result};

/// Overrides the shared library name.
pub const LIBRARY_ENV: &str = "RETROPLAT_NOTCURSES_LIB";

/// Names tried in order when [`LIBRARY_ENV`] is unset.
pub const DEFAULT_LIBRARIES: [&str; 2] = ["libnotcurses-core.so.3", "libnotcurses-core.so"];

/// Something symbols can be looked up in, normally a shared library.
pub trait SymbolSource: Send {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>>;
}

macro_rules! symbol_table {
    ($($name:ident: $ty:ty,)*) => {
        /// The notcurses entry points the backend calls.
        #[derive(Clone, Copy, Debug)]
        pub struct Symbols {
            $(pub $name: $ty,)*
        }

        impl Symbols {
            pub const NAMES: &'static [&'static str] = &[$(stringify!($name),)*];

            fn resolve(source: &dyn SymbolSource) -> Result<Self> {
                Ok(Self {
                    $($name: {
                        let addr = lookup(source, stringify!($name))?;
                        // SAFETY: the symbol comes from the notcurses core library, whose
                        // exported function has the signature of `$ty`.
                        unsafe { std::mem::transmute::<*mut c_void, $ty>(addr.as_ptr()) }
                    },)*
                })
            }
        }
    };
}

symbol_table! {
    notcurses_version: ffi::VersionFn,
    notcurses_core_init: ffi::CoreInitFn,
    notcurses_stop: ffi::StopFn,
    notcurses_stdplane: ffi::StdPlaneFn,
    ncplane_dim_yx: ffi::DimYxFn,
    ncplane_set_resizecb: ffi::SetResizeCbFn,
    notcurses_get: ffi::GetFn,
    notcurses_mice_enable: ffi::MiceEnableFn,
    ncblit_rgba: ffi::BlitRgbaFn,
    ncpile_render: ffi::PileFn,
    ncpile_rasterize: ffi::PileFn,
}

fn lookup(source: &dyn SymbolSource, name: &'static str) -> Result<NonNull<c_void>> {
    source.symbol(name).ok_or_else(|| {
        debug!(symbol = name, "notcurses symbol not found");
        NotcursesError::MissingSymbol(name)
    })
}

type Opener = Box<dyn Fn() -> Result<Box<dyn SymbolSource>> + Send + Sync>;

#[derive(Default)]
struct LoaderState {
    refcount: usize,
    source: Option<Box<dyn SymbolSource>>,
    symbols: Option<Symbols>,
}

/// Reference-counted owner of the library and its resolved symbols.
pub struct SymbolLoader {
    open: Opener,
    state: Mutex<LoaderState>,
}

impl SymbolLoader {
    /// `open` is called on every load from an unloaded state.
    pub fn new<F>(open: F) -> Self
    where
        F: Fn() -> Result<Box<dyn SymbolSource>> + Send + Sync + 'static,
    {
        Self {
            open: Box::new(open),
            state: Mutex::new(LoaderState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn load(self: &Arc<Self>) -> Result<LoadedSymbols> {
        let mut state = self.state();
        if let Some(symbols) = state.symbols {
            state.refcount += 1;
            return Ok(LoadedSymbols {
                loader: Arc::clone(self),
                symbols,
            });
        }

        let source = (self.open)()?;
        // Dropping `source` on failure closes the library again.
        let symbols = Symbols::resolve(&*source).inspect_err(|err| {
            warn!(%err, "notcurses library unusable");
        })?;
        state.refcount = 1;
        state.source = Some(source);
        state.symbols = Some(symbols);
        Ok(LoadedSymbols {
            loader: Arc::clone(self),
            symbols,
        })
    }

    fn unload(&self) {
        let mut state = self.state();
        if state.refcount == 0 {
            return;
        }
        state.refcount -= 1;
        if state.refcount == 0 {
            state.symbols = None;
            state.source = None;
            debug!("notcurses library unloaded");
        }
    }

    pub fn refcount(&self) -> usize {
        self.state().refcount
    }

    pub fn is_loaded(&self) -> bool {
        self.state().symbols.is_some()
    }
}

impl std::fmt::Debug for SymbolLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("SymbolLoader")
            .field("refcount", &state.refcount)
            .field("loaded", &state.symbols.is_some())
            .finish()
    }
}

/// One reference to a loaded symbol table. The function pointers stay valid while it lives.
#[derive(Debug)]
pub struct LoadedSymbols {
    loader: Arc<SymbolLoader>,
    symbols: Symbols,
}

impl Deref for LoadedSymbols {
    type Target = Symbols;

    fn deref(&self) -> &Symbols {
        &self.symbols
    }
}

impl Drop for LoadedSymbols {
    fn drop(&mut self) {
        self.loader.unload();
    }
}

/// Library names to try: the override if one is given, else [`DEFAULT_LIBRARIES`].
pub fn library_candidates(override_name: Option<String>) -> Vec<String> {
    match override_name.filter(|name| !name.is_empty()) {
        Some(name) => vec![name],
        None => DEFAULT_LIBRARIES.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(feature = "dynamic")]
mod library {
    use std::ffi::c_void;
    use std::ptr::NonNull;
    use std::sync::{Arc, OnceLock};

    use tracing::debug;

    use super::{library_candidates, SymbolLoader, SymbolSource, LIBRARY_ENV};
    use crate::{NotcursesError, Result};

    struct SharedLibrary(libloading::Library);

    impl SymbolSource for SharedLibrary {
        fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
            // SAFETY: only the address is read here; `Symbols::resolve` gives it a type.
            let sym = unsafe { self.0.get::<*mut c_void>(name.as_bytes()) }.ok()?;
            NonNull::new(*sym)
        }
    }

    fn open() -> Result<Box<dyn SymbolSource>> {
        let names = library_candidates(std::env::var(LIBRARY_ENV).ok());
        for name in &names {
            // SAFETY: notcurses has no load-time initializers with preconditions.
            match unsafe { libloading::Library::new(name) } {
                Ok(lib) => {
                    debug!(library = %name, "notcurses library opened");
                    return Ok(Box::new(SharedLibrary(lib)));
                }
                Err(err) => debug!(library = %name, %err, "notcurses library not loadable"),
            }
        }
        Err(NotcursesError::NoLibrary {
            tried: names.join(", "),
        })
    }

    /// The process-wide loader for the system library.
    pub fn shared_loader() -> Arc<SymbolLoader> {
        static LOADER: OnceLock<Arc<SymbolLoader>> = OnceLock::new();
        Arc::clone(LOADER.get_or_init(|| Arc::new(SymbolLoader::new(open))))
    }
}

#[cfg(feature = "dynamic")]
pub use library::shared_loader;
