use core::fmt::Display;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Cellular modules supported by the driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleVariant {
    /// BG770A-GL, ultra-compact Cat M1/NB2 with GNSS
    Bg770a,
    Bg772a,
    Bg773a,
    /// BG950A-GL, compact Cat M1/NB1/NB2/GPRS with GNSS and iSIM
    #[default]
    Bg950a,
    /// BG951A-GL, GNSS through an external CXD5605
    Bg951a,
    Bg952a,
    Bg953a,
    Bg955a,
}

impl ModuleVariant {
    pub fn family(&self) -> ModuleFamily {
        match self {
            ModuleVariant::Bg951a => ModuleFamily::Xtra,
            _ => ModuleFamily::Alt1350,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModuleVariant::Bg770a => "BG770A",
            ModuleVariant::Bg772a => "BG772A",
            ModuleVariant::Bg773a => "BG773A",
            ModuleVariant::Bg950a => "BG950A",
            ModuleVariant::Bg951a => "BG951A",
            ModuleVariant::Bg952a => "BG952A",
            ModuleVariant::Bg953a => "BG953A",
            ModuleVariant::Bg955a => "BG955A",
        }
    }
}

impl Display for ModuleVariant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModuleVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            ModuleVariant::Bg770a,
            ModuleVariant::Bg772a,
            ModuleVariant::Bg773a,
            ModuleVariant::Bg950a,
            ModuleVariant::Bg951a,
            ModuleVariant::Bg952a,
            ModuleVariant::Bg953a,
            ModuleVariant::Bg955a,
        ]
        .into_iter()
        .find(|variant| variant.name().eq_ignore_ascii_case(s))
        .ok_or(Error::ParseError)
    }
}

/// Commands and URCs of an AGNSS download.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgnssCommands {
    /// Starts the download of assistance data.
    pub download: &'static str,
    /// Key of the URC reporting the download status.
    pub status_key: &'static str,
    /// The status payload contains `success_marker` at `marker_offset` after a successful
    /// download.
    pub success_marker: &'static str,
    pub marker_offset: usize,
    /// Queries the validity of the downloaded data.
    pub verify: &'static str,
}

/// GNSS platform of a module, it determines which commands apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleFamily {
    /// Modules with the ALT1350 GNSS engine.
    Alt1350,
    /// Modules with an external GNSS receiver using XTRA assistance data.
    Xtra,
}

impl ModuleFamily {
    /// Commands selecting the GNSS receiver, sent before the modem reset.
    pub fn gnss_mode_commands(&self) -> &'static [&'static str] {
        match self {
            // CXD5605 over I2C
            ModuleFamily::Xtra => &["AT+QGPSCFG=\"gnss_mode\",1"],
            ModuleFamily::Alt1350 => &[],
        }
    }

    /// GNSS configuration commands sent after URC subscription, before the AGNSS proxy is set.
    pub fn gnss_config_commands(&self) -> &'static [&'static str] {
        match self {
            ModuleFamily::Xtra => &[],
            ModuleFamily::Alt1350 => &[
                "AT+QGPSCFG=\"priority\",1,1",
                "AT%IGNSSEV=\"ALL\",1",
                "AT%IGNSSTST=\"DEBUGNMEA\",\"0x0e0c03ef\"",
            ],
        }
    }

    /// Size of the AGNSS file to download, in days of validity.
    pub fn xtra_file_size(&self) -> Option<u8> {
        match self {
            ModuleFamily::Xtra => None,
            ModuleFamily::Alt1350 => Some(7),
        }
    }

    pub fn agnss(&self) -> AgnssCommands {
        match self {
            ModuleFamily::Alt1350 => AgnssCommands {
                download: "AT+QGPSCFG=\"xtra_download\"",
                status_key: "QGPSURC",
                success_marker: "0",
                marker_offset: 10,
                verify: "AT+QGPSXTRADATA?",
            },
            ModuleFamily::Xtra => AgnssCommands {
                download: "AT+QGPSCFG=\"xtra_download\",1",
                status_key: "QGPSURC",
                success_marker: "0",
                marker_offset: 10,
                verify: "AT+QGPSXTRATIME?",
            },
        }
    }
}
