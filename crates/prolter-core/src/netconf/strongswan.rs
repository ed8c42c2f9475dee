//! strongSwan IKEv2 / PSK templates

use super::{StrongSwanOptions, VpnPeer};

/// `conn` block for `ipsec.conf`. No trailing newline.
pub fn render_tunnel_config(peer: &VpnPeer, opts: &StrongSwanOptions) -> String {
    let right = peer
        .remote_address
        .as_deref()
        .filter(|addr| !addr.is_empty())
        .unwrap_or("%any");

    format!(
        "conn {name}
  auto=add
  keyexchange=ikev2
  type=tunnel
  authby=psk
  left=%any
  leftid={left_id}
  leftsubnet={left_subnet}
  right={right}
  rightsubnet={right_subnet}
  ike=aes256-sha256-modp2048
  esp=aes256-sha256",
        name = peer.name,
        left_id = opts.left_id,
        left_subnet = opts.left_subnet,
        right = right,
        right_subnet = peer.remote_subnet,
    )
}

/// One `ipsec.secrets` line: `<left_id> : PSK "<key>"`
pub fn render_secret_entry(peer: &VpnPeer, opts: &StrongSwanOptions) -> String {
    format!("{} : PSK \"{}\"", opts.left_id, peer.pre_shared_key)
}
