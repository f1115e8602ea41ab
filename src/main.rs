use flowref::{declare_type, flow, flow_contract, get_flow, init_dotenv, FlowResult, MethodRef};

flow_contract! {
    /// Operaciones de texto despachadas por flujos.
    pub trait TextFlows {
        fn process_two(&self, a: String, b: String) -> FlowResult<String>;
        fn shout(&self, text: String) -> FlowResult<String>;
        fn audit(&self, text: String) -> FlowResult<()>;
    }
}

struct Combiner;

declare_type!(Combiner { combine / 2 });

impl Combiner {
    fn combine(a: &str, b: &str) -> String {
        format!("{a}+{b}")
    }
}

/// Demo: define tres flujos sobre `TextFlows` y los invoca.
fn run_demo() -> FlowResult<()> {
    let flows = flow().from(MethodRef::<dyn TextFlows>::new("process_two"))?
                      .to_ref(MethodRef::<Combiner>::new("combine"), |a: String, b: String| Combiner::combine(&a, &b))?
                      .build()?;

    flow().from(MethodRef::<dyn TextFlows>::new("shout"))?
          .to(|text: String| println!("[shout] {text}"))
          .to(|text: String| format!("{}!", text.to_uppercase()));

    flow().from(MethodRef::<dyn TextFlows>::new("audit"))?
          .to(|text: String| println!("[audit] {text}"));

    println!("process_two(\"a\", \"b\") = {}", flows.process_two("a".into(), "b".into())?);
    let same = get_flow::<dyn TextFlows>()?;
    println!("shout(\"hola\") = {}", same.shout("hola".into())?);
    same.audit("demo".into())?;

    if let Some(record) = flow().registry().record_of::<dyn TextFlows>() {
        for summary in record.handler().summaries() {
            println!("{} steps={} sealed={}", summary.id, summary.steps, summary.sealed);
        }
    }
    Ok(())
}

fn main() {
    // antes de que el registro global lea FLOWREF_*
    init_dotenv();
    if let Err(e) = run_demo() {
        eprintln!("demo failed: {e}");
        std::process::exit(1);
    }
}
