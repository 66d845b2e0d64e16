use crate::core_ftpcommand::handler::{CommandHandler, HandlerRegistry};
use crate::core_ftpcommand::{
    auth, feat, help, noop, opts, pass, pasv, port, quit, retr, stor, syst, type_, user,
};

/// The built-in command set.
///
/// ABOR and REIN are missing on purpose: the connection driver answers them
/// itself because they act on the driver's own state.
pub fn initialize_command_handlers() -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();

    // Security commands. The security state machine decides when they may run.
    handlers.insert("USER", CommandHandler::new(user::handle_user_command).without_login());
    handlers.insert("PASS", CommandHandler::new(pass::handle_pass_command).without_login());
    handlers.insert(
        "AUTH",
        CommandHandler::new(auth::handle_auth_command).without_login(),
    );

    handlers.insert("QUIT", CommandHandler::new(quit::handle_quit_command).without_login());
    handlers.insert("NOOP", CommandHandler::new(noop::handle_noop_command).without_login());
    handlers.insert("SYST", CommandHandler::new(syst::handle_syst_command).without_login());
    handlers.insert("FEAT", CommandHandler::new(feat::handle_feat_command).without_login());
    handlers.insert("HELP", CommandHandler::new(help::handle_help_command).without_login());
    handlers.insert(
        "OPTS",
        CommandHandler::new(opts::handle_opts_command)
            .without_login()
            .with_feature("UTF8"),
    );

    handlers.insert("TYPE", CommandHandler::new(type_::handle_type_command));

    handlers.insert("PASV", CommandHandler::new(pasv::handle_pasv_command));
    handlers.insert(
        "EPSV",
        CommandHandler::new(pasv::handle_epsv_command).with_feature("EPSV"),
    );
    handlers.insert("PORT", CommandHandler::new(port::handle_port_command));
    handlers.insert(
        "EPRT",
        CommandHandler::new(port::handle_eprt_command).with_feature("EPRT"),
    );

    handlers.insert("RETR", CommandHandler::new(retr::handle_retr_command).abortable());
    handlers.insert("STOR", CommandHandler::new(stor::handle_stor_command).abortable());

    handlers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_set() {
        let handlers = initialize_command_handlers();
        assert!(!handlers.contains("ABOR"));
        assert!(!handlers.contains("REIN"));
        assert!(handlers.get("RETR").unwrap().is_abortable());
        assert!(handlers.get("RETR").unwrap().requires_login());
        assert!(!handlers.get("USER").unwrap().requires_login());
        assert!(!handlers.get("PASV").unwrap().is_abortable());
        assert_eq!(handlers.features(), vec!["EPRT", "EPSV", "UTF8"]);
    }
}
