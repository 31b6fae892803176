//! Module availability predicates
//!
//! The import resolver only searches the project for modules the target
//! environment cannot import by itself. Whether a module is importable is
//! answered by a [`ModuleAvailability`] supplied by the caller.

use moka::sync::Cache;
use std::collections::HashSet;
use std::process::{Command, Stdio};

/// Answers whether a dotted module path imports in the target environment
pub trait ModuleAvailability: Send + Sync {
    /// Whether `module` can be imported
    fn is_available(&self, module: &str) -> bool;
}

const STDLIB_MODULES: &[&str] = &[
    "__future__", "_thread", "abc", "argparse", "array", "ast", "asyncio", "atexit", "base64",
    "bdb", "binascii", "bisect", "builtins", "bz2", "calendar", "cmath", "cmd", "code", "codecs",
    "collections", "colorsys", "compileall", "concurrent", "configparser", "contextlib",
    "contextvars", "copy", "copyreg", "cProfile", "csv", "ctypes", "dataclasses", "datetime",
    "dbm", "decimal", "difflib", "dis", "doctest", "email", "encodings", "enum", "errno",
    "faulthandler", "fcntl", "filecmp", "fileinput", "fnmatch", "fractions", "ftplib",
    "functools", "gc", "getopt", "getpass", "gettext", "glob", "graphlib", "grp", "gzip",
    "hashlib", "heapq", "hmac", "html", "http", "imaplib", "importlib", "inspect", "io",
    "ipaddress", "itertools", "json", "keyword", "linecache", "locale", "logging", "lzma",
    "mailbox", "marshal", "math", "mimetypes", "mmap", "multiprocessing", "netrc", "numbers",
    "operator", "optparse", "os", "pathlib", "pdb", "pickle", "pkgutil", "platform", "plistlib",
    "poplib", "posix", "pprint", "profile", "pstats", "pty", "pwd", "py_compile", "pyclbr",
    "pydoc", "queue", "quopri", "random", "re", "readline", "reprlib", "resource", "rlcompleter",
    "runpy", "sched", "secrets", "select", "selectors", "shelve", "shlex", "shutil", "signal",
    "site", "smtplib", "socket", "socketserver", "sqlite3", "ssl", "stat", "statistics",
    "string", "stringprep", "struct", "subprocess", "symtable", "sys", "sysconfig", "syslog",
    "tabnanny", "tarfile", "tempfile", "termios", "textwrap", "threading", "time", "timeit",
    "tkinter", "token", "tokenize", "tomllib", "trace", "traceback", "tracemalloc", "tty",
    "turtle", "types", "typing", "unicodedata", "unittest", "urllib", "uuid", "venv",
    "warnings", "wave", "weakref", "webbrowser", "winreg", "wsgiref", "xml", "xmlrpc",
    "zipapp", "zipfile", "zipimport", "zlib", "zoneinfo",
];

/// Treats the Python standard library, plus caller-supplied extras, as available
#[derive(Debug, Clone, Default)]
pub struct StdlibAvailability {
    extra: HashSet<String>,
}

impl StdlibAvailability {
    /// Standard library only
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also treat `modules` (top-level names) as installed
    #[must_use]
    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra.extend(modules.into_iter().map(Into::into));
        self
    }
}

impl ModuleAvailability for StdlibAvailability {
    fn is_available(&self, module: &str) -> bool {
        let top = module.split('.').next().unwrap_or(module);
        STDLIB_MODULES.contains(&top) || self.extra.contains(top)
    }
}

const PROBE_SCRIPT: &str =
    "import importlib.util, sys\nsys.exit(0 if importlib.util.find_spec(sys.argv[1]) else 1)";

/// Asks a Python interpreter, caching each answer
///
/// The interpreter runs isolated (`-I`), so modules that only import
/// because they sit in the working directory count as missing. When the
/// interpreter cannot be started the standard-library list answers instead.
pub struct PythonProbe {
    python: String,
    cache: Cache<String, bool>,
    fallback: StdlibAvailability,
}

impl PythonProbe {
    /// Probe with the given interpreter executable
    #[must_use]
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
            cache: Cache::new(1024),
            fallback: StdlibAvailability::new(),
        }
    }

    fn probe(&self, module: &str) -> bool {
        let status = Command::new(&self.python)
            .args(["-I", "-c", PROBE_SCRIPT, module])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => status.success(),
            Err(err) => {
                tracing::warn!(python = %self.python, error = %err, "module probe unavailable, using the standard library list");
                self.fallback.is_available(module)
            }
        }
    }
}

impl std::fmt::Debug for PythonProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PythonProbe")
            .field("python", &self.python)
            .field("cached", &self.cache.entry_count())
            .finish()
    }
}

impl ModuleAvailability for PythonProbe {
    fn is_available(&self, module: &str) -> bool {
        self.cache.get_with(module.to_string(), || self.probe(module))
    }
}
