//! Internationalization (i18n) module for user-facing messages.

/// User-facing messages.
#[derive(Debug, Clone)]
pub struct Messages {
    pub calibration: &'static str,
    pub detection: &'static str,
    pub estimated_length: &'static str,
    pub no_subject: &'static str,
    pub no_reference: &'static str,
    pub tap_two_points: &'static str,
    pub tap_distinct_points: &'static str,
    pub enter_positive_distance: &'static str,
    pub subject_too_small: &'static str,
    pub detection_failed: &'static str,
    pub operation_failed: &'static str,
    pub record_saved: &'static str,
    pub validation: &'static str,
    pub invalid_form: &'static str,
    pub manual_entry_hint: &'static str,
    pub welcome: &'static str,
    pub account_created: &'static str,
    pub reset_code_sent: &'static str,
    pub password_changed: &'static str,
    pub invalid_email: &'static str,
    pub password_too_short: &'static str,
    pub name_too_short: &'static str,
}

/// Portuguese messages
pub static MESSAGES_PT: Messages = Messages {
    calibration: "Calibração",
    detection: "Detecção",
    estimated_length: "Comprimento estimado",
    no_subject: "Nenhum peixe detectado na foto.",
    no_reference: "Objeto de referência não encontrado na foto.",
    tap_two_points: "Toque duas vezes na régua (ex.: 0 cm e 10 cm).",
    tap_distinct_points: "Toque em dois pontos diferentes da régua.",
    enter_positive_distance: "Informe a distância real em cm (ex.: 10).",
    subject_too_small: "O peixe ficou pequeno demais na foto para medir; aproxime-se ou informe o tamanho manualmente.",
    detection_failed: "Não foi possível detectar peixes.",
    operation_failed: "Não foi possível concluir a operação.",
    record_saved: "Registro salvo com sucesso",
    validation: "Validação",
    invalid_form: "Verifique: Nome (mín. 2), Área e CM (número positivo).",
    manual_entry_hint: "Você pode informar o tamanho manualmente.",
    welcome: "Bem-vindo",
    account_created: "Conta criada com sucesso! Faça login.",
    reset_code_sent: "Se o e-mail existir, enviamos um código.",
    password_changed: "Senha alterada. Faça login novamente.",
    invalid_email: "E-mail inválido",
    password_too_short: "A senha deve ter pelo menos 6 caracteres.",
    name_too_short: "O nome deve ter pelo menos 2 caracteres.",
};

/// English messages
pub static MESSAGES_EN: Messages = Messages {
    calibration: "Calibration",
    detection: "Detection",
    estimated_length: "Estimated length",
    no_subject: "No fish detected in the photo.",
    no_reference: "Reference object not found in the photo.",
    tap_two_points: "Tap the ruler twice (e.g. at 0 cm and 10 cm).",
    tap_distinct_points: "Tap two distinct points on the ruler.",
    enter_positive_distance: "Enter a positive reference distance in cm (e.g. 10).",
    subject_too_small: "The fish is too small in the photo to measure; move closer or enter the length manually.",
    detection_failed: "Could not detect any fish.",
    operation_failed: "Operation failed.",
    record_saved: "Record saved successfully",
    validation: "Validation",
    invalid_form: "Check: Name (min. 2), Area and CM (positive number).",
    manual_entry_hint: "You can still enter the length manually.",
    welcome: "Welcome",
    account_created: "Account created! Please sign in.",
    reset_code_sent: "If the e-mail exists, a code has been sent.",
    password_changed: "Password changed. Please sign in again.",
    invalid_email: "Invalid e-mail",
    password_too_short: "The password must have at least 6 characters.",
    name_too_short: "The name must have at least 2 characters.",
};

/// Get messages by language.
///
/// # Arguments
/// * `lang` - Language code, "en" for English, anything else for Portuguese.
pub fn get_messages(lang: &str) -> &'static Messages {
    match lang {
        "en" => &MESSAGES_EN,
        _ => &MESSAGES_PT,
    }
}

/// Format the generic operation-failed notice with the underlying cause appended.
pub fn operation_failed(lang: &str, cause: &str) -> String {
    format!("{}\n{}", get_messages(lang).operation_failed, cause)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_messages() {
        let pt = get_messages("pt");
        assert_eq!(pt.calibration, "Calibração");

        let en = get_messages("en");
        assert_eq!(en.calibration, "Calibration");

        // Unknown languages fall back to Portuguese
        assert_eq!(get_messages("xx").detection, "Detecção");
    }

    #[test]
    fn test_operation_failed_appends_cause() {
        let text = operation_failed("en", "HTTP 500");
        assert!(text.starts_with("Operation failed."));
        assert!(text.ends_with("HTTP 500"));
    }
}
