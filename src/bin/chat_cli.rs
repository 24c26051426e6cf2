//! Terminal client for the IUP campus assistant.
//!
//! A small REPL over the chat controller: log in, pick a conversation,
//! send text messages, or run a voice turn. Diagnostics go to stderr so
//! stdout stays readable.

use iup_chat::api::types::{InputType, Role};
use iup_chat::api::validate_registration;
use iup_chat::{ApiClient, ChatController, ClientConfig, Navigator, Route, SessionStore};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("iup_chat=info")),
        )
        .init();

    let config = ClientConfig::load_default()?;
    let session = SessionStore::open_default();
    let initial = if session.is_authenticated() {
        Route::Chat
    } else {
        Route::Login
    };
    let navigator = Navigator::new(initial);
    let api = ApiClient::new(config.api.base_url.as_str(), session, navigator.clone());

    println!("IUP Chat v{}", env!("CARGO_PKG_VERSION"));
    println!("Asistente de la Institución Universitaria del Putumayo");
    println!("Escribe /ayuda para ver los comandos.\n");

    let controller = Arc::new(ChatController::from_config(&config, api.clone()).await);
    if !controller.capture().is_supported() {
        println!("(entrada de voz no disponible: no se encontró micrófono)\n");
    }

    let cancel = CancellationToken::new();
    let events = {
        let controller = Arc::clone(&controller);
        let cancel = cancel.clone();
        tokio::spawn(async move { controller.run(cancel).await })
    };

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, shutting down");
                cancel.cancel();
            }
        });
    }

    repl(&controller, &navigator, cancel.clone()).await;

    cancel.cancel();
    let _ = events.await;
    Ok(())
}

async fn repl(controller: &ChatController, navigator: &Navigator, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => break,
            },
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        match command {
            "/salir" | "/quit" => break,
            "/ayuda" => print_help(),
            "/login" => {
                let (Some(email), Some(password)) = (parts.next(), parts.next()) else {
                    println!("Uso: /login <correo> <contraseña>");
                    continue;
                };
                match controller.api().login(email, password).await {
                    Ok(auth) => {
                        navigator.goto(Route::Chat);
                        let name = auth.user.display_name.as_deref().unwrap_or("usuario");
                        println!("Bienvenido, {name}.");
                        controller.load_conversations().await;
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }
            "/registro" => {
                let (Some(email), Some(password), Some(confirm)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    println!("Uso: /registro <correo> <contraseña> <confirmación> [nombre]");
                    continue;
                };
                if let Err(message) = validate_registration(password, confirm) {
                    println!("Error: {message}");
                    continue;
                }
                let display_name = parts.collect::<Vec<_>>().join(" ");
                let display_name = if display_name.is_empty() {
                    email.to_owned()
                } else {
                    display_name
                };
                match controller.api().register(email, password, &display_name).await {
                    Ok(_) => {
                        navigator.goto(Route::Chat);
                        println!("Cuenta creada. Bienvenido, {display_name}.");
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }
            "/logout" => {
                controller.api().session().logout();
                navigator.goto(Route::Login);
                println!("Sesión cerrada.");
            }
            "/conversaciones" => {
                controller.load_conversations().await;
                let state = controller.snapshot();
                report_error(&state.error);
                for conversation in &state.conversations {
                    let title = conversation.title.as_deref().unwrap_or("(sin título)");
                    println!("  {}  {}", conversation.id, title);
                }
            }
            "/nueva" => {
                if let Some(id) = controller.create_conversation().await {
                    println!("Conversación {id} creada.");
                } else {
                    report_error(&controller.snapshot().error);
                }
            }
            "/abrir" => {
                let Some(id) = parts.next() else {
                    println!("Uso: /abrir <id>");
                    continue;
                };
                controller.select_conversation(id).await;
                let state = controller.snapshot();
                report_error(&state.error);
                for message in &state.messages {
                    print_message(message);
                }
            }
            "/borrar" => {
                let Some(id) = parts.next() else {
                    println!("Uso: /borrar <id>");
                    continue;
                };
                controller.delete_conversation(id).await;
                report_error(&controller.snapshot().error);
            }
            "/fuentes" => {
                let state = controller.snapshot();
                if state.sources.is_empty() {
                    println!("No hay fuentes para la última respuesta.");
                }
                for source in &state.sources {
                    println!(
                        "  [{:.2}] {}: {}",
                        source.score, source.document_title, source.content_preview
                    );
                }
            }
            "/voz" => {
                voice_turn(controller, &mut lines).await;
            }
            "/salud" => match controller.api().check_health().await {
                Ok(health) => {
                    println!("Estado: {}", health.status);
                    for (name, service) in &health.services {
                        println!("  {name}: {}", service.status);
                    }
                }
                Err(e) => println!("Error: {e}"),
            },
            _ if command.starts_with('/') => {
                println!("Comando desconocido: {command}. Escribe /ayuda.");
            }
            _ => {
                if navigator.current() == Route::Login {
                    println!("Inicia sesión primero: /login <correo> <contraseña>");
                    continue;
                }
                match controller.send_message(line, InputType::Text, None).await {
                    Some(reply) => println!("Asistente: {reply}"),
                    None => report_error(&controller.snapshot().error),
                }
            }
        }
    }
}

/// One voice turn: record until Enter, then let the event loop transcribe
/// and send.
async fn voice_turn(
    controller: &ChatController,
    lines: &mut tokio::io::Lines<BufReader<tokio::io::Stdin>>,
) {
    if !controller.capture().is_supported() {
        println!("La entrada de voz no está disponible.");
        return;
    }

    controller.start_voice().await;
    if !controller.capture().is_listening() {
        report_error(&controller.snapshot().error);
        return;
    }

    println!("Grabando... presiona Enter para terminar.");
    let _ = lines.next_line().await;
    let messages_before = controller.snapshot().messages.len();
    controller.stop_voice().await;

    // The event loop picks up the transcript and performs the send.
    for _ in 0..150 {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let state = controller.snapshot();
        if state.error.is_some() {
            report_error(&state.error);
            return;
        }
        if !state.is_loading && state.messages.len() > messages_before {
            if let Some(reply) = state.messages.iter().rev().find(|m| m.role == Role::Assistant)
            {
                println!("Asistente: {}", reply.content);
            }
            return;
        }
    }
    println!("No llegó respuesta a tiempo.");
}

fn print_message(message: &iup_chat::api::types::Message) {
    let who = match message.role {
        Role::User => "Tú",
        Role::Assistant => "Asistente",
        Role::System => "Sistema",
    };
    println!("{who}: {}", message.content);
}

fn report_error(error: &Option<String>) {
    if let Some(error) = error {
        println!("Error: {error}");
    }
}

fn print_help() {
    println!("Comandos:");
    println!("  /login <correo> <contraseña>      iniciar sesión");
    println!("  /registro <correo> <p> <p> [nom]  crear cuenta");
    println!("  /logout                           cerrar sesión");
    println!("  /conversaciones                   listar conversaciones");
    println!("  /nueva                            crear conversación");
    println!("  /abrir <id>                       abrir conversación");
    println!("  /borrar <id>                      eliminar conversación");
    println!("  /voz                              turno de voz");
    println!("  /fuentes                          fuentes de la última respuesta");
    println!("  /salud                            estado del servidor");
    println!("  /salir                            salir");
    println!("  (cualquier otro texto se envía como mensaje)");
}
