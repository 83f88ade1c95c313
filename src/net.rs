/// Strips the port from a transport remote address.
///
/// `10.0.0.1:5000` → `10.0.0.1`, `[::1]:8080` → `::1`. Anything without a
/// recognizable port (a bare IPv4 address, a bare IPv6 literal) is returned
/// unchanged.
pub fn client_ip(remote_addr: &str) -> &str {
    if let Some(rest) = remote_addr.strip_prefix('[') {
        if let Some((host, port)) = rest.split_once("]:") {
            if is_port(port) {
                return host;
            }
        }
        return remote_addr;
    }

    match remote_addr.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && is_port(port) => host,
        _ => remote_addr,
    }
}

fn is_port(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
