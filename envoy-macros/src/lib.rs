mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Waits on several awaitables concurrently through one `Io` handle.
///
/// ```rust,ignore
/// let (a, b) = envoy::join!(io, compute(3), compute(7));
/// ```
///
/// Every awaitable receives the environment of `io`. The outputs come back
/// as a tuple in argument order once all of them completed.
#[proc_macro]
pub fn join(input: TokenStream) -> TokenStream {
    let mut args = utils::split_args(input);

    if args.is_empty() {
        return utils::compile_error("join! expects an `Io` handle followed by awaitables");
    }

    let io = utils::tokens_to_string(&args.remove(0));
    let count = args.len();

    if count == 0 {
        return "()".parse().unwrap_or_default();
    }

    if count == 1 {
        let expr = utils::tokens_to_string(&args[0]);
        return format!("{{ ({io}).wait({expr}).await }}")
            .parse()
            .unwrap_or_default();
    }

    let mut output = String::new();
    output.push_str("{\n");
    output.push_str(&format!("let __io = &({io});\n"));

    for (i, expr_tokens) in args.iter().enumerate() {
        let idx = i + 1;
        let expr = utils::tokens_to_string(expr_tokens);
        output.push_str(&format!(
            "let mut __f{idx} = (::std::boxed::Box::pin(__io.wait({expr})), ::core::option::Option::None::<_>, false);\n"
        ));
    }

    output.push_str("::std::future::poll_fn(move |cx| {\n");
    output.push_str("    use ::std::future::Future;\n");
    output.push_str("    use ::std::task::Poll;\n");

    for i in 1..=count {
        output.push_str(&format!(
            "    if !__f{i}.2 {{\n\
                    if let Poll::Ready(val) = __f{i}.0.as_mut().poll(cx) {{\n\
                        __f{i}.1 = ::core::option::Option::Some(val);\n\
                        __f{i}.2 = true;\n\
                    }}\n\
                }}\n"
        ));
    }

    let all_done = (1..=count)
        .map(|i| format!("__f{i}.2"))
        .collect::<Vec<_>>()
        .join(" && ");

    output.push_str(&format!("    if {all_done} {{\n"));
    output.push_str("        Poll::Ready((\n");

    for i in 1..=count {
        output.push_str(&format!(
            "            __f{i}.1.take().expect(\"join! output taken twice\"),\n"
        ));
    }

    output.push_str("        ))\n");
    output.push_str("    } else {\n");
    output.push_str("        Poll::Pending\n");
    output.push_str("    }\n");
    output.push_str("}).await\n");
    output.push_str("}\n");

    match output.parse::<TokenStream>() {
        Ok(ts) => ts,
        Err(err) => utils::compile_error(&format!("join! macro error: {err}")),
    }
}

/// Runs `async fn main` as a root task on an inline executor.
///
/// The function may take the root task's `Io` handle as its only
/// parameter. The body may use `?` on `envoy::Result`; a failure of the
/// root task panics with its message.
///
/// ```rust,ignore
/// #[envoy::main]
/// async fn main(io: envoy::Io) {
///     let value = io.wait(compute(3)).await?;
///     println!("{value}");
/// }
/// ```
#[proc_macro_attribute]
pub fn main(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[envoy::main] expects a function body");
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let io = utils::take_io_param(&mut tokens).unwrap_or_else(|| "_io".to_string());
    utils::strip_async(&mut tokens);

    let new_block = format!(
        "{{
            if let ::core::result::Result::Err(error) = {} {{
                ::core::panic!(\"root task failed: {{error}}\");
            }}
        }}",
        utils::root_task(&io, &block)
    );

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[envoy::main] expects a function body");
    };

    match new_block.parse() {
        Ok(stream) => tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream)),
        Err(err) => return utils::compile_error(&format!("#[envoy::main] macro error: {err}")),
    }

    tokens.into_iter().collect()
}

/// Runs an `async fn` test as a root task on an inline executor.
///
/// Same rules as `#[envoy::main]`; a failure of the root task fails the
/// test with its message, so `#[should_panic(expected = ...)]` sees the
/// message of a panic raised inside the body.
#[proc_macro_attribute]
pub fn test(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut tokens = item.into_iter().collect::<Vec<_>>();

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[envoy::test] expects a function body");
    };

    let block = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => unreachable!(),
    };

    let io = utils::take_io_param(&mut tokens).unwrap_or_else(|| "_io".to_string());
    utils::strip_async(&mut tokens);

    let new_block = format!(
        "{{
            if let ::core::result::Result::Err(error) = {} {{
                ::core::panic!(\"test task failed: {{error}}\");
            }}
        }}",
        utils::root_task(&io, &block)
    );

    let Some(pos) = utils::body_position(&tokens) else {
        return utils::compile_error("#[envoy::test] expects a function body");
    };

    match new_block.parse() {
        Ok(stream) => tokens[pos] = TokenTree::Group(Group::new(Delimiter::Brace, stream)),
        Err(err) => return utils::compile_error(&format!("#[envoy::test] macro error: {err}")),
    }

    let test_attr: TokenStream = "#[::core::prelude::v1::test]".parse().unwrap_or_default();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(tokens);

    result.into_iter().collect()
}
