//! Startup configuration. Deliberately thin: the only required input is
//! the TCP port to listen on, taken from the single positional argument.

use libbst::TResult;

pub struct Config {
    pub port: u16,
}

impl Config {
    pub fn from_args(mut args: impl Iterator<Item = String>) -> TResult<Config> {
        let _argv0 = args.next();
        let port_arg = args
            .next()
            .ok_or("usage: bstored <port>")?;
        let port: u16 = port_arg
            .parse()
            .map_err(|_| format!("'{port_arg}' is not a valid port number"))?;
        if port == 0 {
            return Err(format!("'{port_arg}' is not a valid port number").into());
        }
        Ok(Config { port })
    }
}
