use crate::domain::error::{CubeError, CubeResult};
use std::collections::HashSet;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Source of candidate free host ports
pub trait PortProbe: Send + Sync {
    /// Return a port that was free at the time of the call
    fn probe(&self) -> io::Result<u16>;
}

/// Asks the OS for an ephemeral port by binding to port 0
#[derive(Debug, Clone)]
pub struct EphemeralProbe {
    bind_addr: IpAddr,
}

impl EphemeralProbe {
    pub fn new(bind_addr: IpAddr) -> Self {
        Self { bind_addr }
    }
}

impl Default for EphemeralProbe {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl PortProbe for EphemeralProbe {
    fn probe(&self) -> io::Result<u16> {
        let listener = TcpListener::bind(SocketAddr::new(self.bind_addr, 0))?;
        Ok(listener.local_addr()?.port())
    }
}

/// Walks a fixed inclusive range, returning the next port that binds
#[derive(Debug)]
pub struct RangeProbe {
    bind_addr: IpAddr,
    start: u16,
    end: u16,
    cursor: AtomicU32,
}

impl RangeProbe {
    /// Bounds given in either order cover the same range
    pub fn new(bind_addr: IpAddr, start: u16, end: u16) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            bind_addr,
            start,
            end,
            cursor: AtomicU32::new(0),
        }
    }

    fn span(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }
}

impl PortProbe for RangeProbe {
    fn probe(&self) -> io::Result<u16> {
        let span = self.span();
        for _ in 0..span {
            let offset = self.cursor.fetch_add(1, Ordering::Relaxed) % span;
            let port = (u32::from(self.start) + offset) as u16;
            if TcpListener::bind(SocketAddr::new(self.bind_addr, port)).is_ok() {
                return Ok(port);
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("no bindable port in {}-{}", self.start, self.end),
        ))
    }
}

/// Leases host ports so no two live sessions share one
pub struct PortAllocator {
    leased: Mutex<HashSet<u16>>,
    probe: Box<dyn PortProbe>,
    max_attempts: usize,
}

impl PortAllocator {
    /// Allocator backed by OS-assigned ephemeral ports
    pub fn new() -> Self {
        Self::with_probe(Box::new(EphemeralProbe::default()), 64)
    }

    pub fn with_probe(probe: Box<dyn PortProbe>, max_attempts: usize) -> Self {
        Self {
            leased: Mutex::new(HashSet::new()),
            probe,
            max_attempts: max_attempts.max(1),
        }
    }

    fn leased_set(&self) -> MutexGuard<'_, HashSet<u16>> {
        // Every critical section is a single insert or remove, so a poisoned set is still consistent.
        self.leased.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lease a single free host port
    pub fn lease(&self) -> CubeResult<u16> {
        for attempt in 1..=self.max_attempts {
            let port = self.probe.probe().map_err(|e| CubeError::ResourceExhausted {
                message: "no free host port available".to_string(),
                source: Some(e),
            })?;

            if self.leased_set().insert(port) {
                debug!("Leased host port {}", port);
                return Ok(port);
            }

            debug!("Port {} is already leased, probing again (attempt {})", port, attempt);
        }

        warn!("Gave up leasing a port after {} attempts", self.max_attempts);
        Err(CubeError::exhausted(format!(
            "every probed port was already leased after {} attempts",
            self.max_attempts
        )))
    }

    /// Release a leased port. Returns false if it was not leased.
    pub fn release(&self, port: u16) -> bool {
        let released = self.leased_set().remove(&port);
        if released {
            debug!("Released host port {}", port);
        }
        released
    }

    /// Release several ports, ignoring ones that are not leased
    pub fn release_all(&self, ports: &[u16]) {
        let mut leased = self.leased_set();
        for port in ports {
            leased.remove(port);
        }
        debug!("Released host ports {:?}", ports);
    }

    /// Lease `count` ports as a group that is released on drop unless committed
    pub fn lease_many(self: &Arc<Self>, count: usize) -> CubeResult<PortLease> {
        let mut lease = PortLease {
            allocator: Arc::clone(self),
            ports: Vec::with_capacity(count),
            committed: false,
        };
        for _ in 0..count {
            let port = self.lease()?;
            lease.ports.push(port);
        }
        Ok(lease)
    }

    pub fn is_leased(&self, port: u16) -> bool {
        self.leased_set().contains(&port)
    }

    pub fn leased_count(&self) -> usize {
        self.leased_set().len()
    }

    /// Sorted snapshot of leased ports
    pub fn leased_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.leased_set().iter().copied().collect();
        ports.sort_unstable();
        ports
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Ports leased for one provisioning attempt
///
/// Dropping an uncommitted lease returns every port to the allocator, which is
/// how failed or abandoned provisioning attempts roll back.
pub struct PortLease {
    allocator: Arc<PortAllocator>,
    ports: Vec<u16>,
    committed: bool,
}

impl std::fmt::Debug for PortLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortLease")
            .field("ports", &self.ports)
            .field("committed", &self.committed)
            .finish_non_exhaustive()
    }
}

impl PortLease {
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Hand ownership of the ports to the caller; they stay leased
    pub fn commit(mut self) -> Vec<u16> {
        self.committed = true;
        std::mem::take(&mut self.ports)
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        if !self.committed && !self.ports.is_empty() {
            debug!("Rolling back {} leased port(s)", self.ports.len());
            self.allocator.release_all(&self.ports);
        }
    }
}
