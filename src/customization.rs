//! First-boot customisation scripts.
//!
//! [`select_scripts`] is a pure function from a script dialect and the
//! requested customisations to an ordered list of note bodies. Each script
//! carries a priority that becomes the prefix of the note name, so the
//! provider runs them in the same order however they were created.

use std::fmt;
use std::net::Ipv4Addr;

use crate::server_config::{PrivateAddress, ScriptFamily, ServerConfig};

const SHUTDOWN_TRIGGER: &str = "sh -c 'sleep 10; shutdown -h now' &";

/// Concern addressed by a script.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptPurpose {
    /// Privilege and package preparation for the login user.
    Prepare,
    /// Static address for the secondary interface.
    AddPrivateIp,
    /// Default gateway override.
    ChangeGateway,
    /// Disables the shared interface.
    DisablePrimary,
    /// Re-enables SSH password authentication.
    EnablePasswordAuth,
}

impl ScriptPurpose {
    const fn priority(self) -> u8 {
        match self {
            Self::Prepare => 10,
            Self::AddPrivateIp => 20,
            Self::ChangeGateway => 30,
            Self::DisablePrimary => 40,
            Self::EnablePasswordAuth => 50,
        }
    }

    const fn description(self) -> &'static str {
        match self {
            Self::Prepare => "prepare the guest for provisioning",
            Self::AddPrivateIp => "configure the secondary interface",
            Self::ChangeGateway => "change the default gateway",
            Self::DisablePrimary => "disable the shared interface",
            Self::EnablePasswordAuth => "enable ssh password authentication",
        }
    }
}

impl fmt::Display for ScriptPurpose {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.description())
    }
}

/// Customisations requested for one instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CustomizationRequest {
    /// Default login user of the image.
    pub login_user: String,
    /// Docker engine port opened in the guest firewall.
    pub engine_port: u16,
    /// Secondary interface addressing.
    pub private: Option<PrivateAddress>,
    /// Default gateway override.
    pub gateway: Option<Ipv4Addr>,
    /// Whether the shared interface is disabled.
    pub disable_primary: bool,
    /// Whether SSH password authentication stays enabled.
    pub enable_password_auth: bool,
    /// Whether the final script schedules a shutdown.
    pub reboot: bool,
}

impl CustomizationRequest {
    /// Derives the request from a validated configuration.
    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        let policy = config.policy();
        let network = config.network();
        Self {
            login_user: policy.login_user.to_owned(),
            engine_port: config.engine_port(),
            private: network.private,
            gateway: network.gateway,
            disable_primary: network.private_ip_only,
            enable_password_auth: config.auth().enable_password_auth,
            reboot: policy.needs_reboot,
        }
    }
}

/// One script to be attached as a note.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NoteScript {
    /// Ordering prefix; lower runs first.
    pub priority: u8,
    /// Concern addressed by the script.
    pub purpose: ScriptPurpose,
    /// Shell script content.
    pub body: String,
}

/// Selects the ordered scripts for a dialect.
///
/// `None` yields an empty list: images without a dialect are usable without
/// customisation. When `request.reboot` is set, the last script schedules a
/// shutdown so that the caller can observe the guest stopping on its own.
#[must_use]
pub fn select_scripts(
    family: Option<ScriptFamily>,
    request: &CustomizationRequest,
) -> Vec<NoteScript> {
    let Some(dialect) = family else {
        return Vec::new();
    };

    let mut scripts: Vec<(ScriptPurpose, Vec<String>)> = Vec::new();
    scripts.push((ScriptPurpose::Prepare, prepare(dialect, request)));
    if let Some(private) = request.private {
        scripts.push((ScriptPurpose::AddPrivateIp, add_private_ip(dialect, private)));
    }
    if let Some(gateway) = request.gateway {
        scripts.push((ScriptPurpose::ChangeGateway, change_gateway(dialect, gateway)));
    }
    if request.disable_primary {
        scripts.push((ScriptPurpose::DisablePrimary, disable_primary(dialect)));
    }
    if request.enable_password_auth {
        scripts.push((
            ScriptPurpose::EnablePasswordAuth,
            vec![
                "sed -i 's/^#\\?PasswordAuthentication .*/PasswordAuthentication yes/' /etc/ssh/sshd_config"
                    .to_owned(),
            ],
        ));
    }

    if request.reboot
        && let Some((_, lines)) = scripts.last_mut()
    {
        lines.push(SHUTDOWN_TRIGGER.to_owned());
    }

    scripts
        .into_iter()
        .map(|(purpose, lines)| NoteScript {
            priority: purpose.priority(),
            purpose,
            body: render(dialect, purpose, &lines),
        })
        .collect()
}

fn render(dialect: ScriptFamily, purpose: ScriptPurpose, lines: &[String]) -> String {
    let mut body = String::from("#!/bin/bash\n# @sacloud-once\n");
    body.push_str(&format!("# @sacloud-desc sacloud-machine: {purpose}\n"));
    match dialect {
        ScriptFamily::Debian => {
            body.push_str("# @sacloud-require-archive distro-debian\n");
            body.push_str("# @sacloud-require-archive distro-ubuntu\n");
            body.push_str("export DEBIAN_FRONTEND=noninteractive\n");
        }
        ScriptFamily::RedHat => body.push_str("# @sacloud-require-archive distro-centos\n"),
    }
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body.push_str("exit 0\n");
    body
}

fn prepare(dialect: ScriptFamily, request: &CustomizationRequest) -> Vec<String> {
    match dialect {
        ScriptFamily::Debian => vec![format!(
            "echo \"{} ALL=(ALL) NOPASSWD:ALL\" >> /etc/sudoers || exit 1",
            request.login_user
        )],
        ScriptFamily::RedHat => vec![
            "yum install -y net-tools || exit 1".to_owned(),
            format!(
                "firewall-cmd --zone=public --add-port={}/tcp --permanent || exit 1",
                request.engine_port
            ),
        ],
    }
}

fn add_private_ip(dialect: ScriptFamily, private: PrivateAddress) -> Vec<String> {
    match dialect {
        ScriptFamily::Debian => vec![
            "echo \"auto eth1\" >> /etc/network/interfaces".to_owned(),
            "echo \"iface eth1 inet static\" >> /etc/network/interfaces".to_owned(),
            format!("echo \"address {}\" >> /etc/network/interfaces", private.ip),
            format!(
                "echo \"netmask {}\" >> /etc/network/interfaces",
                private.subnet_mask
            ),
            "ifdown eth1; ifup eth1".to_owned(),
        ],
        ScriptFamily::RedHat => vec![
            "cat > /etc/sysconfig/network-scripts/ifcfg-eth1 <<'EOF'".to_owned(),
            "DEVICE=eth1".to_owned(),
            "BOOTPROTO=static".to_owned(),
            "ONBOOT=yes".to_owned(),
            format!("IPADDR={}", private.ip),
            format!("NETMASK={}", private.subnet_mask),
            "EOF".to_owned(),
            "ifdown eth1; ifup eth1".to_owned(),
        ],
    }
}

fn change_gateway(dialect: ScriptFamily, gateway: Ipv4Addr) -> Vec<String> {
    match dialect {
        ScriptFamily::Debian => vec![
            "sed -i 's/gateway/#gateway/g' /etc/network/interfaces".to_owned(),
            format!("echo \"up route add default gw {gateway}\" >> /etc/network/interfaces"),
        ],
        ScriptFamily::RedHat => vec![
            "sed -i '/^GATEWAY=/d' /etc/sysconfig/network-scripts/ifcfg-eth0".to_owned(),
            "sed -i '/^GATEWAY=/d' /etc/sysconfig/network".to_owned(),
            format!("echo \"GATEWAY={gateway}\" >> /etc/sysconfig/network"),
        ],
    }
}

fn disable_primary(dialect: ScriptFamily) -> Vec<String> {
    match dialect {
        ScriptFamily::Debian => vec![
            "sed -i 's/iface eth0 inet static/iface eth0 inet manual/g' /etc/network/interfaces"
                .to_owned(),
            "ifdown eth0 || true".to_owned(),
        ],
        ScriptFamily::RedHat => vec![
            "sed -i 's/^ONBOOT=.*/ONBOOT=no/' /etc/sysconfig/network-scripts/ifcfg-eth0"
                .to_owned(),
            "ifdown eth0 || true".to_owned(),
        ],
    }
}
