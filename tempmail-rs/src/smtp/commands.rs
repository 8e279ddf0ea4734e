use crate::error::{MailError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum SmtpCommand {
    Helo(String),
    Ehlo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    Rset,
    Quit,
    Noop,
    Unknown(String),
}

impl SmtpCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(MailError::SmtpProtocol("Empty command".to_string()));
        }

        let (verb, args) = match line.split_once(' ') {
            Some((verb, args)) => (verb, args.trim()),
            None => (line, ""),
        };

        match verb.to_uppercase().as_str() {
            "HELO" => {
                if args.is_empty() {
                    return Err(MailError::SmtpProtocol("HELO requires domain".to_string()));
                }
                Ok(SmtpCommand::Helo(args.to_string()))
            }
            "EHLO" => {
                if args.is_empty() {
                    return Err(MailError::SmtpProtocol("EHLO requires domain".to_string()));
                }
                Ok(SmtpCommand::Ehlo(args.to_string()))
            }
            "MAIL" => Ok(SmtpCommand::MailFrom(Self::parse_path(args, "FROM:")?)),
            "RCPT" => Ok(SmtpCommand::RcptTo(Self::parse_path(args, "TO:")?)),
            "DATA" => Ok(SmtpCommand::Data),
            "RSET" => Ok(SmtpCommand::Rset),
            "QUIT" => Ok(SmtpCommand::Quit),
            "NOOP" => Ok(SmtpCommand::Noop),
            other => Ok(SmtpCommand::Unknown(other.to_string())),
        }
    }

    /// Extract the address from `FROM:<addr> [params]` / `TO:<addr> [params]`
    ///
    /// ESMTP parameters after the path (SIZE=, BODY=, ...) are ignored.
    fn parse_path(args: &str, keyword: &str) -> Result<String> {
        let prefix_ok = args
            .get(..keyword.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(keyword));
        if !prefix_ok {
            return Err(MailError::SmtpProtocol(format!(
                "Expected {}<address>",
                keyword
            )));
        }

        let rest = args[keyword.len()..].trim_start();
        let address = if let Some(stripped) = rest.strip_prefix('<') {
            let end = stripped
                .find('>')
                .ok_or_else(|| MailError::SmtpProtocol("Unterminated path".to_string()))?;
            &stripped[..end]
        } else {
            rest.split_whitespace().next().unwrap_or("")
        };

        Ok(address.trim().to_string())
    }
}
