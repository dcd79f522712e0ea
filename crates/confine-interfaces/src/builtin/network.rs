//! `network`: outbound network access.

use crate::error::Result;
use crate::interface::{ConnectedPair, Interface, StaticInfo};
use crate::specs::{apparmor, seccomp};

const APPARMOR_PLUG_SNIPPET: &str = "#include <abstractions/nameservice>
network inet,
network inet6,
@{PROC}/sys/net/core/somaxconn r,";

const SECCOMP_PLUG_SYSCALLS: &[&str] = &[
    "socket",
    "connect",
    "getsockname",
    "getpeername",
    "getsockopt",
    "recvfrom",
    "recvmsg",
    "sendto",
    "sendmsg",
    "shutdown",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkInterface;

impl Interface for NetworkInterface {
    fn name(&self) -> &str {
        "network"
    }

    fn static_info(&self) -> StaticInfo {
        StaticInfo {
            summary: "allows access to the network",
            implicit_on_core: true,
        }
    }

    fn apparmor_connected_plug(
        &self,
        spec: &mut apparmor::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        spec.add_snippet(APPARMOR_PLUG_SNIPPET);
        Ok(())
    }

    fn seccomp_connected_plug(
        &self,
        spec: &mut seccomp::Specification,
        _conn: &ConnectedPair<'_>,
    ) -> Result<()> {
        spec.allow_syscalls(SECCOMP_PLUG_SYSCALLS);
        Ok(())
    }
}
