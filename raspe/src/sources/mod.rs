//! Built-in data sources.
//!
//! Brazilian government portals (Presidência, Senado, Câmara, CNJ, IPEA,
//! CFM), the Folha de S.Paulo search page, and the New York Times Article
//! Search API. [`Source`] names each one and builds its adapter.

mod camara;
mod cfm;
mod cnj;
mod folha;
mod ipea;
mod nyt;
mod presidencia;
mod senado;

pub use camara::CamaraAdapter;
pub use cfm::CfmAdapter;
pub use cnj::CnjAdapter;
pub use folha::FolhaAdapter;
pub use ipea::IpeaAdapter;
pub use nyt::{NytAdapter, API_KEY_ENV};
pub use presidencia::PresidenciaAdapter;
pub use senado::SenadoAdapter;

use crate::adapter::SourceAdapter;
use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A built-in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Legislação da Presidência da República.
    Presidencia,
    /// Legislação federal no portal do Senado.
    Senado,
    /// Legislação na Câmara dos Deputados.
    Camara,
    /// Atos normativos do Conselho Nacional de Justiça.
    Cnj,
    /// Publicações do IPEA.
    Ipea,
    /// Normas do Conselho Federal de Medicina.
    Cfm,
    /// Busca da Folha de S.Paulo.
    Folha,
    /// New York Times Article Search.
    Nyt,
}

impl Source {
    /// Every built-in source.
    pub const ALL: [Self; 8] = [
        Self::Presidencia,
        Self::Senado,
        Self::Camara,
        Self::Cnj,
        Self::Ipea,
        Self::Cfm,
        Self::Folha,
        Self::Nyt,
    ];

    /// The source's short name, as used in quotas and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Presidencia => "presidencia",
            Self::Senado => "senado",
            Self::Camara => "camara",
            Self::Cnj => "cnj",
            Self::Ipea => "ipea",
            Self::Cfm => "cfm",
            Self::Folha => "folha",
            Self::Nyt => "nyt",
        }
    }

    /// Builds the adapter with default settings.
    ///
    /// The NYT adapter picks up its key from `NYT_API_KEY`.
    #[must_use]
    pub fn adapter(self) -> Arc<dyn SourceAdapter> {
        match self {
            Self::Presidencia => Arc::new(PresidenciaAdapter::new()),
            Self::Senado => Arc::new(SenadoAdapter::new()),
            Self::Camara => Arc::new(CamaraAdapter::new()),
            Self::Cnj => Arc::new(CnjAdapter::new()),
            Self::Ipea => Arc::new(IpeaAdapter::new()),
            Self::Cfm => Arc::new(CfmAdapter::new()),
            Self::Folha => Arc::new(FolhaAdapter::new()),
            Self::Nyt => Arc::new(NytAdapter::from_env()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Source {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|source| source.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let names = Self::ALL.map(Self::name);
                ValidationError::invalid_choice("source", wanted, &names)
            })
    }
}
