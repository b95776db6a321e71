use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Splits a `TokenStream` into comma-separated arguments.
///
/// Each argument is returned as a `Vec<TokenTree>`. Commas inside
/// delimited groups belong to the group, so only top-level commas split.
pub(crate) fn split_args(input: TokenStream) -> Vec<Vec<TokenTree>> {
    let mut args = Vec::new();
    let mut current = Vec::new();

    for token in input {
        match &token {
            TokenTree::Punct(p) if p.as_char() == ',' => {
                if !current.is_empty() {
                    args.push(current);
                    current = Vec::new();
                }
            }
            _ => current.push(token),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Converts a slice of tokens back into Rust source.
pub(crate) fn tokens_to_string(tokens: &[TokenTree]) -> String {
    tokens.iter().cloned().collect::<TokenStream>().to_string()
}

/// Returns `true` if `token` is the identifier `name`.
pub(crate) fn is_ident(token: &TokenTree, name: &str) -> bool {
    matches!(token, TokenTree::Ident(id) if id.to_string() == name)
}

/// Removes the `async` keyword from a function signature.
pub(crate) fn strip_async(tokens: &mut Vec<TokenTree>) {
    if let Some(pos) = tokens.iter().position(|t| is_ident(t, "async")) {
        tokens.remove(pos);
    }
}

/// Position of the function body, the last brace-delimited group.
pub(crate) fn body_position(tokens: &[TokenTree]) -> Option<usize> {
    tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))
}

/// Takes the parameter list out of a function signature.
///
/// The parameter group that follows the function name is replaced with an
/// empty one. Returns the name bound by the first parameter, if any, so
/// `async fn main(io: Io)` yields `Some("io")`.
pub(crate) fn take_io_param(tokens: &mut [TokenTree]) -> Option<String> {
    let fn_pos = tokens.iter().position(|t| is_ident(t, "fn"))?;

    let params_pos = tokens[fn_pos..]
        .iter()
        .position(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Parenthesis))?
        + fn_pos;

    let TokenTree::Group(params) = &tokens[params_pos] else {
        return None;
    };

    let name = params
        .stream()
        .into_iter()
        .find(|t| matches!(t, TokenTree::Ident(_)) && !is_ident(t, "mut"))
        .map(|t| t.to_string());

    tokens[params_pos] = TokenTree::Group(Group::new(Delimiter::Parenthesis, TokenStream::new()));

    name
}

/// Builds the expression that drives `body` as a root task.
///
/// The body runs inside a task on a fresh inline executor; `io` names the
/// task's `Io` handle inside the body. Evaluates to the run's `Result`.
pub(crate) fn root_task(io: &str, body: &str) -> String {
    format!(
        "::envoy::run_sync(
            ::envoy::ExecutorRef::new(::envoy::InlineExecutor::new()),
            ::envoy::Task::new(move |{io}: ::envoy::Io| async move {{
                ::core::result::Result::<_, ::envoy::Error>::Ok({{ {body} }})
            }}),
        )"
    )
}

/// Emits a `compile_error!` carrying `message`.
pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("::core::compile_error!({message:?});")
        .parse()
        .unwrap_or_default()
}
