//! xl2tpd client section and PPP options templates

use std::path::{Path, PathBuf};

use super::{EmitError, VpnPeer};

/// Username of the peer, checked to be usable inside a file name
pub fn username(peer: &VpnPeer) -> Result<&str, EmitError> {
    let user = peer
        .username
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or(EmitError::MissingField("username"))?;

    let bad = user == "."
        || user.contains("..")
        || user.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        || user.chars().any(char::is_whitespace);
    if bad {
        return Err(EmitError::InvalidIdentifier(user.to_string()));
    }
    Ok(user)
}

/// `<ppp_dir>/options.l2tpd.<username>`
pub fn ppp_options_path(peer: &VpnPeer, ppp_dir: &Path) -> Result<PathBuf, EmitError> {
    Ok(ppp_dir.join(format!("options.l2tpd.{}", username(peer)?)))
}

/// `[client-<username>]` section for `xl2tpd.conf`
pub fn render_client_config(peer: &VpnPeer, ppp_dir: &Path) -> Result<String, EmitError> {
    let user = username(peer)?;
    let lns = peer
        .remote_address
        .as_deref()
        .filter(|addr| !addr.is_empty())
        .ok_or(EmitError::MissingField("remote_address"))?;

    Ok(format!(
        "[client-{user}]
lns = {lns}
ppp debug = yes
pppoptfile = {optfile}
length bit = yes",
        optfile = ppp_options_path(peer, ppp_dir)?.display(),
    ))
}

/// Per-user PPP options file contents
pub fn render_ppp_options(peer: &VpnPeer) -> Result<String, EmitError> {
    let user = username(peer)?;
    let password = peer
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or(EmitError::MissingField("password"))?;

    Ok(format!(
        "name {user}
password {password}
require-mschap-v2
refuse-eap
require-authentication
ms-dns 8.8.8.8
ms-dns 1.1.1.1
noccp
idle 1800
mtu 1410
mru 1410
lock
connect-delay 5000"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netconf::test_peer;

    #[test]
    fn test_client_config() {
        let conf = render_client_config(&test_peer(), Path::new("/etc/ppp")).unwrap();
        assert!(conf.starts_with("[client-branch01]\n"));
        assert!(conf.contains("lns = 203.0.113.5\n"));
        assert!(conf.contains("pppoptfile = /etc/ppp/options.l2tpd.branch01\n"));
        assert!(conf.ends_with("length bit = yes"));
    }

    #[test]
    fn test_ppp_options() {
        let opts = render_ppp_options(&test_peer()).unwrap();
        assert!(opts.starts_with("name branch01\npassword l2tp-pass\n"));
        assert!(opts.contains("require-mschap-v2"));
        assert!(opts.ends_with("connect-delay 5000"));
    }

    #[test]
    fn test_missing_fields() {
        let mut peer = test_peer();
        peer.password = None;
        assert!(matches!(
            render_ppp_options(&peer),
            Err(EmitError::MissingField("password"))
        ));

        peer.username = None;
        assert!(matches!(
            render_client_config(&peer, Path::new("/etc/ppp")),
            Err(EmitError::MissingField("username"))
        ));

        let mut peer = test_peer();
        peer.remote_address = None;
        assert!(matches!(
            render_client_config(&peer, Path::new("/etc/ppp")),
            Err(EmitError::MissingField("remote_address"))
        ));
    }

    #[test]
    fn test_username_rejects_path_tricks() {
        for bad in ["../../etc/passwd", "a/b", "two words", ".", "x..y"] {
            let mut peer = test_peer();
            peer.username = Some(bad.to_string());
            assert!(
                matches!(username(&peer), Err(EmitError::InvalidIdentifier(_))),
                "{bad} should be rejected"
            );
        }
    }
}
