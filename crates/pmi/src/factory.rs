//! Backend probing and construction.
//!
//! Selection is deterministic and runs once. The wire protocol wins when the
//! launcher wired a descriptor into the environment: it is the most robust
//! and least environment-sensitive path. A modern server endpoint in the
//! environment promotes the modern library over the legacy one. The legacy
//! probe runs unconditionally because some resource managers install their
//! legacy library system-wide; those libraries emulate a singleton outside a
//! real job rather than failing. With nothing found, singleton mode keeps
//! development runs working with no launcher at all.

use crate::dispatch::{Backend, Pmi};
use crate::dso::{DlOpener, LdPathList};
use crate::pmi1::{self, Pmi1Api};
use crate::pmix::{self, PmixApi, PmixState};
use crate::wire::{WireClient, WireConnector};

pub(crate) const PREFIX_PMI: &str = "pmi-debug";
pub(crate) const PREFIX_PMIX: &str = "pmix-debug";

type Getenv<'a> = &'a dyn Fn(&str) -> Option<String>;
type LoadPmi1<'a> = &'a dyn Fn(Option<&str>, i32) -> Option<Box<dyn Pmi1Api>>;
type LoadPmix<'a> = &'a dyn Fn(Option<&str>, i32) -> Option<Box<dyn PmixApi>>;

impl Pmi {
	/// Probe the environment in the full preference order — wire protocol,
	/// modern library, legacy library, singleton — and construct a handle
	/// over the first backend that accepts.
	pub fn create(wire: &dyn WireConnector) -> Self {
		let opener = DlOpener;
		let libs = LdPathList::from_env();
		Self::create_with(
			&|name: &str| std::env::var(name).ok(),
			wire,
			&|library: Option<&str>, debug| pmi1::load(&opener, &libs, library, debug),
			&|library: Option<&str>, debug| pmix::load(&opener, &libs, library, debug),
		)
	}

	pub(crate) fn create_with(
		getenv: Getenv<'_>,
		wire: &dyn WireConnector,
		load_pmi1: LoadPmi1<'_>,
		load_pmix: LoadPmix<'_>,
	) -> Self {
		let debug = debug_level(getenv, "FLUX_PMI_DEBUG");
		if let Some(cli) = connect_wire(getenv, wire, debug) {
			return Self::with_backend(Backend::Wire(cli), PREFIX_PMI, debug);
		}
		if getenv("PMIX_SERVER_URI").is_some() || getenv("PMIX_SERVER_URI2").is_some() {
			if let Some(api) = load_pmix(getenv("PMIX_LIBRARY").as_deref(), debug) {
				return Self::with_backend(
					Backend::Pmix(PmixState::new(api)),
					PREFIX_PMI,
					debug,
				);
			}
		} else {
			tracing::debug!("pmix-debug-dlopen: no PMIX environment");
		}
		if let Some(api) = load_pmi1(getenv("PMI_LIBRARY").as_deref(), debug) {
			return Self::with_backend(Backend::Dlopen(api), PREFIX_PMI, debug);
		}
		Self::with_backend(Backend::Singleton, PREFIX_PMI, debug)
	}

	/// Modern-only construction: probe the modern library, else singleton.
	/// Wire mode is reachable through [`Pmi::create`] alone.
	pub fn create_pmix() -> Self {
		let opener = DlOpener;
		let libs = LdPathList::from_env();
		Self::create_pmix_with(
			&|name: &str| std::env::var(name).ok(),
			&|library: Option<&str>, debug| pmix::load(&opener, &libs, library, debug),
		)
	}

	pub(crate) fn create_pmix_with(getenv: Getenv<'_>, load_pmix: LoadPmix<'_>) -> Self {
		let debug = debug_level(getenv, "FLUX_PMIX_DEBUG");
		if let Some(api) = load_pmix(getenv("PMIX_LIBRARY").as_deref(), debug) {
			return Self::with_backend(Backend::Pmix(PmixState::new(api)), PREFIX_PMIX, debug);
		}
		Self::with_backend(Backend::Singleton, PREFIX_PMIX, debug)
	}
}

fn debug_level(getenv: Getenv<'_>, name: &str) -> i32 {
	getenv(name)
		.and_then(|v| v.trim().parse().ok())
		.unwrap_or(0)
}

fn connect_wire(
	getenv: Getenv<'_>,
	wire: &dyn WireConnector,
	debug: i32,
) -> Option<Box<dyn WireClient>> {
	let fd = getenv("PMI_FD")?.parse().ok()?;
	let rank = getenv("PMI_RANK")?.parse().ok()?;
	let size = getenv("PMI_SIZE")?.parse().ok()?;
	wire.connect(fd, rank, size, debug)
}
