//! Chat session with prayer-time tool integration demo
//!
//! This demo runs a conversational session against Gemini where the model
//! can resolve prayer-time questions for Saudi cities through the
//! get_prayer_times tool, streaming the reply as it arrives.
//!
//! Run with: cargo run --example chat_with_prayer_tool
//!
//! Requirements:
//!   - GEMINI_API_KEY set in the environment (or a .env file)

use futures::stream::StreamExt;
use moriati::llm::gateways::GeminiGateway;
use moriati::llm::tools::PrayerTimesTool;
use moriati::llm::{ChatSession, LlmBroker};
use std::io::{self, Write};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "أنت مساعد ذكاء اصطناعي باسم موريافي. كن ودودًا ومساعدًا. \
    مهمتك هي الإجابة على الأسئلة وتنفيذ المهام المطلوبة. إذا طُلب منك أوقات الصلاة، \
    استخدم الأداة المتاحة لك ثم قم بعرض النتائج للمستخدم بصيغة واضحة وجميلة باللغة العربية. \
    مثال: \"أوقات الصلاة في [المدينة] اليوم هي:\n- الفجر: [الوقت]\n- الظهر: [الوقت]\n\
    - العصر: [الوقت]\n- المغرب: [الوقت]\n- العشاء: [الوقت]\".";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Initialize tracing for debug output
    tracing_subscriber::fmt::init();

    // Create LLM broker with Gemini
    let gateway = Arc::new(GeminiGateway::new());
    let broker = LlmBroker::new("gemini-2.5-flash", gateway);

    // Create chat session with the prayer-times tool
    let tools: Vec<Box<dyn moriati::llm::LlmTool>> = vec![Box::new(PrayerTimesTool::new())];

    let mut session = ChatSession::builder(broker)
        .system_prompt(SYSTEM_PROMPT)
        .tools(tools)
        .build();

    println!("Moriati Chat");
    println!("============");
    println!("Ask about prayer times in Saudi cities! Try questions like:");
    println!("  - ما هي أوقات الصلاة في الرياض؟");
    println!("  - متى المغرب في جدة اليوم؟");
    println!("\nType your messages and press Enter. Send empty message to exit.\n");

    loop {
        // Get user input
        print!("You: ");
        io::stdout().flush()?;

        let mut query = String::new();
        io::stdin().read_line(&mut query)?;
        let query = query.trim();

        // Exit on empty input
        if query.is_empty() {
            println!("\nGoodbye!");
            break;
        }

        print!("Moriati: ");
        io::stdout().flush()?;

        // Each item is the full reply so far; print only the new tail.
        // A turn error arrives as a fresh message, not an extension.
        let mut printed = 0;
        {
            let mut stream = session.submit_turn(query);
            while let Some(snapshot) = stream.next().await {
                if snapshot.len() >= printed && snapshot.is_char_boundary(printed) {
                    print!("{}", &snapshot[printed..]);
                } else {
                    print!("\n{}", snapshot);
                }
                io::stdout().flush()?;
                printed = snapshot.len();
            }
        }

        println!("\n");
    }

    Ok(())
}
