//! Languages and the localized unlock error messages.

use serde::{Deserialize, Serialize};

use crate::claim::FailureReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    De,
    Nl,
    Fr,
}

pub const SUPPORTED: &[Lang] = &[Lang::En, Lang::De, Lang::Nl, Lang::Fr];

impl Lang {
    pub fn code(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::De => "de",
            Lang::Nl => "nl",
            Lang::Fr => "fr",
        }
    }

    /// Parses a language tag by its base subtag: `de-AT` -> `De`.
    pub fn parse(tag: &str) -> Option<Self> {
        let base = tag.trim().split(['-', '_']).next()?.to_ascii_lowercase();
        SUPPORTED.iter().copied().find(|l| l.code() == base)
    }

    /// First supported language in an `Accept-Language` header, in header
    /// order (q-values are not weighed). English otherwise.
    pub fn detect(accept_language: Option<&str>) -> Self {
        accept_language
            .into_iter()
            .flat_map(|h| h.split(','))
            .filter_map(|part| part.split(';').next())
            .find_map(Lang::parse)
            .unwrap_or_default()
    }
}

struct UnlockErrors {
    invalid: &'static str,
    used: &'static str,
    config: &'static str,
    network: &'static str,
    generic: &'static str,
}

fn unlock_errors(lang: Lang) -> &'static UnlockErrors {
    match lang {
        Lang::En => &UnlockErrors {
            invalid: "Invalid code. Please check and try again.",
            used: "This code was already used.",
            config: "Server not configured. Contact support.",
            network: "Network error. Please try again.",
            generic: "Something went wrong. Please try again.",
        },
        Lang::De => &UnlockErrors {
            invalid: "Ungültiger Code. Bitte prüfen und erneut versuchen.",
            used: "Dieser Code wurde bereits verwendet.",
            config: "Server nicht konfiguriert. Bitte Support kontaktieren.",
            network: "Netzwerkfehler. Bitte erneut versuchen.",
            generic: "Etwas ist schiefgelaufen. Bitte erneut versuchen.",
        },
        Lang::Nl => &UnlockErrors {
            invalid: "Ongeldige code. Controleer en probeer opnieuw.",
            used: "Deze code is al gebruikt.",
            config: "Server niet geconfigureerd. Neem contact op met support.",
            network: "Netwerkfout. Probeer het opnieuw.",
            generic: "Er is iets misgegaan. Probeer het opnieuw.",
        },
        Lang::Fr => &UnlockErrors {
            invalid: "Code invalide. Veuillez vérifier et réessayer.",
            used: "Ce code a déjà été utilisé.",
            config: "Serveur non configuré. Contactez le support.",
            network: "Erreur réseau. Veuillez réessayer.",
            generic: "Une erreur est survenue. Veuillez réessayer.",
        },
    }
}

/// Message shown for a failed claim. `unknown` failures show the store's
/// diagnostic when there is one.
pub fn unlock_error(lang: Lang, reason: FailureReason, message: Option<&str>) -> String {
    let texts = unlock_errors(lang);
    let text = match reason {
        FailureReason::Invalid => texts.invalid,
        FailureReason::Used => texts.used,
        FailureReason::Config => texts.config,
        FailureReason::Network => texts.network,
        FailureReason::Unknown => match message.filter(|m| !m.trim().is_empty()) {
            Some(m) => return m.to_owned(),
            None => texts.generic,
        },
    };
    text.to_owned()
}
