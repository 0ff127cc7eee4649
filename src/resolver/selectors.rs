//! Portal URLs, selectors, and per-target navigation flows.
//!
//! Everything brittle about the SOL portal lives here so a markup change is
//! a one-file fix.

use crate::models::Target;

/// SOL menu entry point; the login form is embedded in this page.
pub const LOGIN_URL: &str =
    "https://e-menu.sunat.gob.pe/cl-ti-itmenu/MenuInternet.htm?agrupacion=*&pestana=*";

/// Exact title of the menu page after a successful login. Anything else
/// means the login did not land.
pub const EXPECTED_TITLE: &str = "SUNAT - Menú SOL";

pub const RUC_INPUT: &str = "#txtRuc";
pub const USERNAME_INPUT: &str = "#txtUsuario";
pub const KEY_INPUT: &str = "#txtContrasena";
pub const LOGIN_BUTTON: &str = "#btnAceptar";

/// Close buttons for the promotional / informational modals the menu throws
/// up after login. Best-effort: absent is fine, stuck is logged and ignored.
pub const MODAL_CLOSE_SELECTORS: &[&str] = &[
    "#modalInformativo button.close",
    "#divModalAviso .btn-cerrar",
    ".modal.show .modal-footer button",
];

/// Substrings on the login page that indicate throttling or lockout rather
/// than bad credentials.
pub const THROTTLE_MARKERS: &[&str] = &[
    "exceso de intentos",
    "intentos permitidos",
    "usuario bloqueado",
];

/// Menu clicks and storage probe for one target system.
pub struct TargetFlow {
    /// Menu items clicked in order to open the subsystem.
    pub menu_clicks: &'static [&'static str],
    /// Script returning the subsystem's token from client-side storage, or
    /// null when it has not been issued yet.
    pub token_script: &'static str,
}

const SIRE_FLOW: TargetFlow = TargetFlow {
    menu_clicks: &[
        "#nivel1_55",         // Empresas
        "#nivel2_55_5",       // Registros electronicos
        "#nivel3_55_5_1",     // SIRE
        "#nivel4_55_5_1_1_1", // Registro de ventas e ingresos
    ],
    token_script: r#"(() => {
        try {
            const raw = window.sessionStorage.getItem('SUNAT.token')
                || window.localStorage.getItem('SUNAT.token');
            return raw || null;
        } catch (e) { return null; }
    })()"#,
};

const CPE_FLOW: TargetFlow = TargetFlow {
    menu_clicks: &[
        "#nivel1_11",      // Empresas
        "#nivel2_11_1",    // Comprobantes de pago
        "#nivel3_11_1_2",  // Consulta de CPE
        "#nivel4_11_1_2_1_1",
    ],
    token_script: r#"(() => {
        try {
            const raw = window.sessionStorage.getItem('cpe.token')
                || window.sessionStorage.getItem('SUNAT.token');
            return raw || null;
        } catch (e) { return null; }
    })()"#,
};

const UNIFIED_PLATFORM_FLOW: TargetFlow = TargetFlow {
    menu_clicks: &["#aOpcionServicio2"], // Ir a Plataforma Unificada
    token_script: r#"(() => {
        try {
            const session = window.sessionStorage.getItem('SUNAT.menu.session');
            if (session) {
                const parsed = JSON.parse(session);
                if (parsed && parsed.token) return parsed.token;
            }
            return window.sessionStorage.getItem('SUNAT.token') || null;
        } catch (e) { return null; }
    })()"#,
};

/// Dispatch table: the navigation flow for each target system.
pub fn flow_for(target: Target) -> &'static TargetFlow {
    match target {
        Target::Sire => &SIRE_FLOW,
        Target::Cpe => &CPE_FLOW,
        Target::UnifiedPlatform => &UNIFIED_PLATFORM_FLOW,
    }
}
