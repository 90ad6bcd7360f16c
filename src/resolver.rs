//! Address family policy for name resolution.
//!
//! A [`ResolverPolicy`] holds the hook every [`PolicyResolver`] consults
//! when a connection pool resolves a host name. The original hook lets
//! every address through; pinning a family swaps in a hook that keeps
//! only IPv4 or only IPv6 results.
//!
//! Sessions pin through a [`FamilyLease`]. Several sessions may pin the
//! same family; a session asking for the opposite family while another
//! one holds a pin is refused. When the last pin is released the
//! original hook object is reinstalled.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::{debug, info};

use crate::error::ResolverError;

static GLOBAL: Lazy<Arc<ResolverPolicy>> = Lazy::new(|| Arc::new(ResolverPolicy::new()));

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn matches(self, addr: &SocketAddr) -> bool {
        match self {
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => f.write_str("IPv4"),
            Self::V6 => f.write_str("IPv6"),
        }
    }
}

/// Filter applied to resolved addresses.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolverHook {
    family: Option<AddressFamily>,
}

impl ResolverHook {
    fn unrestricted() -> Self {
        Self { family: None }
    }

    fn pinned(family: AddressFamily) -> Self {
        Self {
            family: Some(family),
        }
    }

    /// The family this hook restricts to, `None` for no restriction.
    pub fn family(&self) -> Option<AddressFamily> {
        self.family
    }

    pub fn allows(&self, addr: &SocketAddr) -> bool {
        self.family.map_or(true, |family| family.matches(addr))
    }

    pub fn filter<I>(&self, addrs: I) -> Vec<SocketAddr>
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        addrs.into_iter().filter(|addr| self.allows(addr)).collect()
    }
}

#[derive(Debug)]
struct PolicyState {
    current: Arc<ResolverHook>,
    /// Pinned family and the number of leases holding it.
    pinned: Option<(AddressFamily, usize)>,
}

/// Holder of the active resolver hook.
#[derive(Debug)]
pub struct ResolverPolicy {
    original: Arc<ResolverHook>,
    state: Mutex<PolicyState>,
}

impl ResolverPolicy {
    /// A standalone policy, independent of the process-wide one.
    pub fn new() -> Self {
        let original = Arc::new(ResolverHook::unrestricted());
        Self {
            state: Mutex::new(PolicyState {
                current: Arc::clone(&original),
                pinned: None,
            }),
            original,
        }
    }

    /// The process-wide policy shared by sessions that don't bring their own.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL)
    }

    /// A lease with nothing pinned yet.
    pub fn lease(self: &Arc<Self>) -> FamilyLease {
        FamilyLease {
            policy: Arc::clone(self),
            family: None,
        }
    }

    pub fn current_hook(&self) -> Arc<ResolverHook> {
        Arc::clone(&self.state.lock().current)
    }

    pub fn original_hook(&self) -> Arc<ResolverHook> {
        Arc::clone(&self.original)
    }

    /// Whether the original hook object is installed.
    pub fn is_original(&self) -> bool {
        Arc::ptr_eq(&self.state.lock().current, &self.original)
    }

    pub fn pinned_family(&self) -> Option<AddressFamily> {
        self.state.lock().pinned.map(|(family, _)| family)
    }

    /// Move one lease from `from` to `to`.
    fn transfer(
        &self,
        from: Option<AddressFamily>,
        to: Option<AddressFamily>,
    ) -> Result<(), ResolverError> {
        let mut state = self.state.lock();
        if from == to {
            return Ok(());
        }

        if let (Some(requested), Some((held, count))) = (to, state.pinned) {
            let others = count - usize::from(from == Some(held));
            if held != requested && others > 0 {
                return Err(ResolverError::Conflict {
                    requested,
                    pinned: held,
                });
            }
        }

        if let (Some(released), Some((held, count))) = (from, state.pinned) {
            if released == held {
                state.pinned = (count > 1).then_some((held, count - 1));
            }
        }

        if let Some(requested) = to {
            state.pinned = Some(match state.pinned {
                Some((held, count)) if held == requested => (held, count + 1),
                _ => (requested, 1),
            });
        }

        match state.pinned {
            Some((family, _)) if state.current.family() == Some(family) => {}
            Some((family, _)) => {
                info!(%family, "Restricting name resolution");
                state.current = Arc::new(ResolverHook::pinned(family));
            }
            None => {
                if !Arc::ptr_eq(&state.current, &self.original) {
                    info!("Restoring unrestricted name resolution");
                }
                state.current = Arc::clone(&self.original);
            }
        }
        Ok(())
    }
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// One session's claim on a [`ResolverPolicy`]. Released on drop.
#[derive(Debug)]
pub struct FamilyLease {
    policy: Arc<ResolverPolicy>,
    family: Option<AddressFamily>,
}

impl FamilyLease {
    /// Restrict resolution to `family`, or drop this lease's restriction
    /// for `None`. Pinning one family cancels the other.
    pub fn pin_family(&mut self, family: Option<AddressFamily>) -> Result<(), ResolverError> {
        self.policy.transfer(self.family, family)?;
        self.family = family;
        Ok(())
    }

    pub fn family(&self) -> Option<AddressFamily> {
        self.family
    }

    pub fn policy(&self) -> &Arc<ResolverPolicy> {
        &self.policy
    }
}

impl Drop for FamilyLease {
    fn drop(&mut self) {
        // Releasing never conflicts.
        let _ = self.policy.transfer(self.family, None);
    }
}

/// DNS resolver for connection pools that applies the policy's current
/// hook to every lookup.
#[derive(Debug, Clone)]
pub struct PolicyResolver {
    policy: Arc<ResolverPolicy>,
}

impl PolicyResolver {
    pub fn new(policy: Arc<ResolverPolicy>) -> Self {
        Self { policy }
    }
}

impl Resolve for PolicyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(lookup(self.policy.current_hook(), name.as_str().to_string()))
    }
}

async fn lookup(
    hook: Arc<ResolverHook>,
    host: String,
) -> Result<Addrs, Box<dyn std::error::Error + Send + Sync>> {
    let resolved = tokio::net::lookup_host((host.as_str(), 0)).await?;
    let addrs = hook.filter(resolved);
    debug!(host = %host, count = addrs.len(), family = ?hook.family(), "Resolved host");
    if addrs.is_empty() {
        let family = hook.family().map_or_else(String::new, |f| format!(" {f}"));
        return Err(Box::new(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no{family} addresses found for {host}"),
        )));
    }
    Ok(Box::new(addrs.into_iter()))
}
